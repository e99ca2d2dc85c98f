pub mod app;
pub mod config;
pub mod error;
pub mod gpu;
pub mod gui;
pub mod render;
pub mod shaders;

// Re-export commonly used items
pub use app::App;
pub use config::DemoConfig;
pub use error::{ConfigError, ModelError};
pub use render::{
  camera::{EulerCamera, MovementKeys},
  lighting::{FrameTransforms, LightMode, LightingParams},
  model::{Face, Model, ModelBuffers, PackedMesh},
};
pub use shaders::{fs, vs};
