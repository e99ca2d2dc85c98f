pub mod camera;
pub mod lighting;
pub mod model;
pub mod pipeline;
pub mod vertex;
