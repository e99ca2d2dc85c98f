//! GLSL shaders for the Phong lighting pass.
//!
//! Both stages are compiled to SPIR-V at build time by `vulkano_shaders::shader!`
//! and share one uniform block (`Data`, set 0 binding 0) that carries the
//! per-frame transforms and lighting parameters.

/// Vertex shader module.
///
/// Transforms positions to clip space and hands eye-space position and normal
/// to the fragment stage.
pub mod vs {
  vulkano_shaders::shader! {
    ty: "vertex",
    path: "src/shaders/phong.vert",
  }
}

/// Fragment shader module.
///
/// Per-fragment Phong shading with a single point light.
pub mod fs {
  vulkano_shaders::shader! {
    ty: "fragment",
    path: "src/shaders/phong.frag",
  }
}
