use vulkano::{buffer::BufferContents, pipeline::graphics::vertex_input::Vertex};

/// Object-space vertex position, bound at vertex buffer slot 0.
#[derive(BufferContents, Vertex, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct Position {
  #[format(R32G32B32_SFLOAT)]
  pub position: [f32; 3],
}

/// Object-space vertex normal, bound at vertex buffer slot 1.
#[derive(BufferContents, Vertex, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct Normal {
  #[format(R32G32B32_SFLOAT)]
  pub normal: [f32; 3],
}
