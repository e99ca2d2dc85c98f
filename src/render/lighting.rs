//! Per-frame uniform wiring for the Phong pass.
//!
//! Everything the shaders need is computed here on the CPU once per frame:
//! the model-view and model-view-projection matrices, the normal matrix and
//! the light position in eye space.

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::{config::DemoConfig, render::camera::EulerCamera, shaders::vs};

/// Where the single point light sits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightMode {
  /// The light is placed at the camera every frame.
  Headlight,
  /// The light stays at a world-space position.
  Fixed(Vec3),
}

/// Material and light parameters fed to the fragment shader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingParams {
  /// Global ambient intensity, applied to the diffuse colour
  pub ambient:         f32,
  pub diffuse_colour:  [f32; 3],
  pub specular_colour: [f32; 3],
  /// Phong exponent
  pub shininess:       f32,
  pub light:           LightMode,
}

impl LightingParams {
  pub fn from_config(config: &DemoConfig) -> Self {
    Self {
      ambient:         config.ambient_light,
      diffuse_colour:  config.diffuse_colour,
      specular_colour: [0.5, 0.5, 0.5],
      shininess:       config.shininess,
      light:           LightMode::Headlight,
    }
  }

  /// Light position in world space for the given camera.
  pub fn light_position(&self, camera: &EulerCamera) -> Vec3 {
    match self.light {
      LightMode::Headlight => camera.position,
      LightMode::Fixed(position) => position,
    }
  }
}

impl Default for LightingParams {
  fn default() -> Self {
    Self::from_config(&DemoConfig::default())
  }
}

/// Transforms derived from the camera and model matrix for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTransforms {
  pub model_view:            Mat4,
  pub model_view_projection: Mat4,
  /// Inverse transpose of the model-view's upper 3x3, widened to a 4x4
  pub normal_matrix:         Mat4,
  /// Light position in eye space (w = 1)
  pub light_position:        Vec4,
}

impl FrameTransforms {
  pub fn new(camera: &EulerCamera, model: Mat4, lighting: &LightingParams) -> Self {
    let view = camera.view_matrix();
    let model_view = view * model;
    let model_view_projection = camera.projection_matrix() * model_view;
    let normal_matrix = Mat4::from_mat3(Mat3::from_mat4(model_view).inverse().transpose());
    let light_position = view.transform_point3(lighting.light_position(camera)).extend(1.0);

    Self {
      model_view,
      model_view_projection,
      normal_matrix,
      light_position,
    }
  }

  /// Packs the transforms and lighting parameters into the shader's uniform block.
  pub fn uniform_data(&self, lighting: &LightingParams) -> vs::Data {
    let [dr, dg, db] = lighting.diffuse_colour;
    let [sr, sg, sb] = lighting.specular_colour;
    let ambient = lighting.ambient;

    vs::Data {
      model_view:            self.model_view.to_cols_array_2d(),
      model_view_projection: self.model_view_projection.to_cols_array_2d(),
      normal_matrix:         self.normal_matrix.to_cols_array_2d(),
      light_position:        self.light_position.to_array(),
      ambient_light:         [ambient, ambient, ambient, 1.0],
      diffuse_colour:        [dr, dg, db, 1.0],
      specular_colour:       [sr, sg, sb, 1.0],
      shininess:             lighting.shininess,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPSILON: f32 = 1e-5;

  fn assert_mat_eq(a: Mat4, b: Mat4) {
    assert!(a.abs_diff_eq(b, EPSILON), "{a:?} != {b:?}");
  }

  #[test]
  fn headlight_sits_at_eye_origin() {
    let mut camera = EulerCamera::new(4.0 / 3.0, Vec3::new(-2.19, 1.36, 11.45));
    camera.yaw = 200.0;
    camera.pitch = 15.0;
    let lighting = LightingParams::default();

    let t = FrameTransforms::new(&camera, Mat4::IDENTITY, &lighting);
    assert!(t.light_position.truncate().length() < 1e-4);
    assert_eq!(t.light_position.w, 1.0);
  }

  #[test]
  fn fixed_light_is_transformed_into_eye_space() {
    let camera = EulerCamera::new(1.0, Vec3::new(0.0, 0.0, 5.0));
    let lighting = LightingParams {
      light: LightMode::Fixed(Vec3::ZERO),
      ..LightingParams::default()
    };

    let t = FrameTransforms::new(&camera, Mat4::IDENTITY, &lighting);
    assert!((t.light_position - Vec4::new(0.0, 0.0, -5.0, 1.0)).length() < EPSILON);
  }

  #[test]
  fn rigid_transforms_keep_normal_matrix_as_rotation() {
    let mut camera = EulerCamera::new(1.0, Vec3::new(3.0, -1.0, 2.0));
    camera.yaw = 45.0;
    let model = Mat4::from_rotation_x(0.3);

    let t = FrameTransforms::new(&camera, model, &LightingParams::default());
    let rotation = Mat4::from_mat3(Mat3::from_mat4(t.model_view));
    assert_mat_eq(t.normal_matrix, rotation);
  }

  #[test]
  fn non_uniform_scale_is_inverted_in_normal_matrix() {
    let camera = EulerCamera::new(1.0, Vec3::ZERO);
    let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));

    let t = FrameTransforms::new(&camera, model, &LightingParams::default());
    assert_mat_eq(
      t.normal_matrix,
      Mat4::from_scale(Vec3::new(0.5, 1.0, 1.0)),
    );
  }

  #[test]
  fn mvp_is_projection_times_model_view() {
    let camera = EulerCamera::new(16.0 / 9.0, Vec3::new(1.0, 2.0, 3.0));
    let model = Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0));

    let t = FrameTransforms::new(&camera, model, &LightingParams::default());
    assert_mat_eq(t.model_view, camera.view_matrix() * model);
    assert_mat_eq(t.model_view_projection, camera.projection_matrix() * t.model_view);
  }

  #[test]
  fn uniform_block_carries_lighting_params() {
    let camera = EulerCamera::new(1.0, Vec3::ZERO);
    let lighting = LightingParams::default();
    let data = FrameTransforms::new(&camera, Mat4::IDENTITY, &lighting).uniform_data(&lighting);

    assert_eq!(data.ambient_light, [0.05, 0.05, 0.05, 1.0]);
    assert_eq!(data.diffuse_colour, [0.4, 0.27, 0.17, 1.0]);
    assert_eq!(data.shininess, 10.0);
    assert_eq!(data.model_view, Mat4::IDENTITY.to_cols_array_2d());
  }
}
