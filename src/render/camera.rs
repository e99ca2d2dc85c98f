//! First-person camera driven by Euler angles.
//!
//! The camera keeps its orientation as pitch, yaw and roll in degrees and
//! rebuilds the view matrix from them every frame, the way the classic
//! `glRotate`/`glTranslate` sequence did:
//! * Pitch rotates about X, yaw about Y, roll about Z
//! * The world is then translated by the negated camera position
//! * Movement is expressed relative to the current yaw, so "forward" follows the view
//!
//! # Example
//! ```
//! use core_lighting::{EulerCamera, MovementKeys};
//! use glam::Vec3;
//!
//! let mut camera = EulerCamera::new(4.0 / 3.0, Vec3::new(0.0, 0.0, 5.0));
//! let keys = MovementKeys {
//!   forward: true,
//!   ..MovementKeys::default()
//! };
//!
//! // One 16ms frame of walking forward moves towards -Z.
//! camera.process_keyboard(&keys, 16.0, Vec3::ONE);
//! assert!(camera.position.z < 5.0);
//! ```

use glam::{Mat4, Vec3};
use winit::keyboard::KeyCode;

/// Converts mouse counts to degrees at a mouse speed of 1.
const MOUSE_DEGREES_PER_COUNT: f32 = 0.16;
/// Converts milliseconds to world units at a movement speed of 1.
const UNITS_PER_MILLISECOND: f32 = 0.003;

/// Keyboard movement state, updated from key press and release events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementKeys {
  pub forward: bool,
  pub back:    bool,
  pub left:    bool,
  pub right:   bool,
  pub up:      bool,
  pub down:    bool,
}

impl MovementKeys {
  /// Records a key transition.
  ///
  /// Returns `false` when the key is not a movement key, so the caller can
  /// handle it elsewhere.
  pub fn set(&mut self, key: KeyCode, pressed: bool) -> bool {
    let slot = match key {
      KeyCode::KeyW | KeyCode::ArrowUp => &mut self.forward,
      KeyCode::KeyS | KeyCode::ArrowDown => &mut self.back,
      KeyCode::KeyA | KeyCode::ArrowLeft => &mut self.left,
      KeyCode::KeyD | KeyCode::ArrowRight => &mut self.right,
      KeyCode::Space => &mut self.up,
      KeyCode::ShiftLeft => &mut self.down,
      _ => return false,
    };
    *slot = pressed;
    true
  }

  /// Forgets every held key, e.g. after the cursor is released and key-up
  /// events may never arrive.
  pub fn release_all(&mut self) {
    *self = Self::default();
  }

  fn axis(positive: bool, negative: bool) -> f32 {
    match (positive, negative) {
      (true, false) => 1.0,
      (false, true) => -1.0,
      _ => 0.0,
    }
  }
}

/// A perspective camera positioned in world space and oriented by Euler angles.
///
/// Angles are stored in degrees. Yaw is kept in `[0, 360)` and pitch is clamped
/// by [`EulerCamera::process_mouse`] to the limits the caller passes in.
#[derive(Clone, Debug, PartialEq)]
pub struct EulerCamera {
  /// Camera position in world space
  pub position:     Vec3,
  /// Rotation about the X axis in degrees, positive looks down
  pub pitch:        f32,
  /// Rotation about the Y axis in degrees
  pub yaw:          f32,
  /// Rotation about the Z axis in degrees
  pub roll:         f32,
  /// Vertical field of view in degrees
  pub fov:          f32,
  /// Viewport width divided by height
  pub aspect_ratio: f32,
  pub z_near:       f32,
  pub z_far:        f32,
}

impl EulerCamera {
  /// Creates a camera at `position` looking down -Z with a 90 degree field of view.
  pub fn new(aspect_ratio: f32, position: Vec3) -> Self {
    Self {
      position,
      pitch: 0.0,
      yaw: 0.0,
      roll: 0.0,
      fov: 90.0,
      aspect_ratio,
      z_near: 0.3,
      z_far: 100.0,
    }
  }

  /// Applies a mouse movement to the orientation.
  ///
  /// `delta_x` and `delta_y` are raw mouse counts as reported by the window
  /// system (y grows downward). Moving the mouse down tilts the view down.
  /// Pitch stays within `[max_look_down, max_look_up]`.
  pub fn process_mouse(
    &mut self,
    delta_x: f32,
    delta_y: f32,
    mouse_speed: f32,
    max_look_up: f32,
    max_look_down: f32,
  ) {
    let yaw_delta = delta_x * mouse_speed * MOUSE_DEGREES_PER_COUNT;
    let pitch_delta = delta_y * mouse_speed * MOUSE_DEGREES_PER_COUNT;

    self.yaw = (self.yaw + yaw_delta).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if self.yaw >= 360.0 {
      self.yaw = 0.0;
    }

    self.pitch = (self.pitch + pitch_delta).clamp(max_look_down, max_look_up);
  }

  /// Moves the camera according to held keys.
  ///
  /// `delta_ms` is the frame time in milliseconds and `speed` holds the
  /// strafe (x), vertical (y) and forward (z) multipliers. Opposing keys
  /// cancel each other out.
  pub fn process_keyboard(&mut self, keys: &MovementKeys, delta_ms: f32, speed: Vec3) {
    let step = speed * delta_ms * UNITS_PER_MILLISECOND;

    let strafe = MovementKeys::axis(keys.right, keys.left);
    let walk = MovementKeys::axis(keys.forward, keys.back);
    if strafe != 0.0 || walk != 0.0 {
      self.move_from_look(strafe * step.x, 0.0, -walk * step.z);
    }

    self.position.y += MovementKeys::axis(keys.up, keys.down) * step.y;
  }

  /// Moves relative to the current orientation: `dx` strafes right and `dz`
  /// moves backwards along the view direction. `dy` is scaled by
  /// `sin(pitch - 90°)`, so a positive `dy` moves down when level.
  pub fn move_from_look(&mut self, dx: f32, dy: f32, dz: f32) {
    let yaw = self.yaw.to_radians();
    let yaw_side = (self.yaw - 90.0).to_radians();
    let pitch = self.pitch.to_radians();
    let pitch_side = (self.pitch - 90.0).to_radians();

    self.position.z += dx * yaw_side.cos() + dz * yaw.cos();
    self.position.x -= dx * yaw_side.sin() + dz * yaw.sin();
    self.position.y += dy * pitch_side.sin() + dz * pitch.sin();
  }

  /// World-to-eye transform: rotate by pitch, yaw and roll, then translate by
  /// the negated position.
  pub fn view_matrix(&self) -> Mat4 {
    Mat4::from_rotation_x(self.pitch.to_radians())
      * Mat4::from_rotation_y(self.yaw.to_radians())
      * Mat4::from_rotation_z(self.roll.to_radians())
      * Mat4::from_translation(-self.position)
  }

  /// Eye-to-clip transform for Vulkan: depth maps to `[0, 1]` and the Y axis
  /// is flipped so +Y stays up on screen.
  pub fn projection_matrix(&self) -> Mat4 {
    let mut proj = Mat4::perspective_rh(
      self.fov.to_radians(),
      self.aspect_ratio.max(1e-6),
      self.z_near,
      self.z_far,
    );
    proj.y_axis.y *= -1.0;
    proj
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPSILON: f32 = 1e-4;

  fn camera() -> EulerCamera {
    EulerCamera::new(1.0, Vec3::ZERO)
  }

  fn held(keys: &[KeyCode]) -> MovementKeys {
    let mut state = MovementKeys::default();
    for &key in keys {
      assert!(state.set(key, true));
    }
    state
  }

  #[test]
  fn non_movement_keys_are_not_consumed() {
    let mut keys = MovementKeys::default();
    assert!(!keys.set(KeyCode::Escape, true));
    assert_eq!(keys, MovementKeys::default());
  }

  #[test]
  fn arrows_alias_wasd() {
    assert_eq!(held(&[KeyCode::ArrowUp]), held(&[KeyCode::KeyW]));
    assert_eq!(held(&[KeyCode::ArrowRight]), held(&[KeyCode::KeyD]));
  }

  #[test]
  fn forward_moves_down_negative_z_at_zero_yaw() {
    let mut cam = camera();
    cam.process_keyboard(&held(&[KeyCode::KeyW]), 16.0, Vec3::ONE);
    assert!((cam.position.z + 0.048).abs() < EPSILON);
    assert!(cam.position.x.abs() < EPSILON);
    assert!(cam.position.y.abs() < EPSILON);
  }

  #[test]
  fn strafe_right_moves_positive_x_at_zero_yaw() {
    let mut cam = camera();
    cam.process_keyboard(&held(&[KeyCode::KeyD]), 16.0, Vec3::ONE);
    assert!((cam.position.x - 0.048).abs() < EPSILON);
    assert!(cam.position.z.abs() < EPSILON);
  }

  #[test]
  fn forward_follows_yaw() {
    let mut cam = camera();
    cam.yaw = 90.0;
    cam.process_keyboard(&held(&[KeyCode::KeyW]), 16.0, Vec3::ONE);
    assert!((cam.position.x - 0.048).abs() < EPSILON);
    assert!(cam.position.z.abs() < EPSILON);
  }

  #[test]
  fn forward_descends_when_pitched_down() {
    let mut cam = camera();
    cam.pitch = 30.0;
    cam.yaw = 90.0;
    cam.process_keyboard(&held(&[KeyCode::KeyW]), 100.0, Vec3::ONE);
    assert!((cam.position.y + 0.3 * 30f32.to_radians().sin()).abs() < EPSILON);
    // Horizontal travel follows yaw and is not shortened by pitch
    assert!((cam.position.x - 0.3).abs() < EPSILON);
    assert!(cam.position.z.abs() < EPSILON);
  }

  #[test]
  fn look_relative_vertical_term_follows_pitch() {
    let mut cam = camera();
    cam.move_from_look(0.0, 1.0, 0.0);
    assert!((cam.position.y + 1.0).abs() < EPSILON);

    let mut cam = camera();
    cam.pitch = 30.0;
    cam.move_from_look(0.0, 2.0, 0.0);
    assert!((cam.position.y - 2.0 * (-60f32).to_radians().sin()).abs() < EPSILON);
    assert!(cam.position.x.abs() < EPSILON && cam.position.z.abs() < EPSILON);
  }

  #[test]
  fn opposing_keys_cancel() {
    let mut cam = camera();
    let keys = held(&[
      KeyCode::KeyW,
      KeyCode::KeyS,
      KeyCode::KeyA,
      KeyCode::KeyD,
      KeyCode::Space,
      KeyCode::ShiftLeft,
    ]);
    cam.process_keyboard(&keys, 16.0, Vec3::ONE);
    assert_eq!(cam.position, Vec3::ZERO);
  }

  #[test]
  fn vertical_movement_ignores_orientation() {
    let mut cam = camera();
    cam.pitch = 45.0;
    cam.yaw = 123.0;
    cam.process_keyboard(&held(&[KeyCode::Space]), 10.0, Vec3::new(1.0, 2.0, 1.0));
    assert!((cam.position.y - 0.06).abs() < EPSILON);
    assert!(cam.position.x.abs() < EPSILON && cam.position.z.abs() < EPSILON);
  }

  #[test]
  fn release_all_clears_keys() {
    let mut keys = held(&[KeyCode::KeyW, KeyCode::Space]);
    keys.release_all();
    assert_eq!(keys, MovementKeys::default());
  }

  #[test]
  fn yaw_wraps_into_range() {
    let mut cam = camera();
    cam.yaw = 350.0;
    // 100 counts * 0.16 = 16 degrees
    cam.process_mouse(100.0, 0.0, 1.0, 80.0, -80.0);
    assert!((cam.yaw - 6.0).abs() < EPSILON);

    cam.process_mouse(-100.0, 0.0, 1.0, 80.0, -80.0);
    assert!((cam.yaw - 350.0).abs() < EPSILON);
  }

  #[test]
  fn pitch_is_clamped_to_look_limits() {
    let mut cam = camera();
    cam.process_mouse(0.0, 10_000.0, 1.0, 80.0, -80.0);
    assert_eq!(cam.pitch, 80.0);
    cam.process_mouse(0.0, -10_000.0, 1.0, 80.0, -80.0);
    assert_eq!(cam.pitch, -80.0);
  }

  #[test]
  fn view_matrix_moves_camera_to_origin() {
    let mut cam = EulerCamera::new(1.0, Vec3::new(-2.19, 1.36, 11.45));
    cam.yaw = 37.0;
    cam.pitch = -12.0;
    let eye = cam.view_matrix().transform_point3(cam.position);
    assert!(eye.length() < EPSILON);
  }

  #[test]
  fn view_direction_matches_forward_movement() {
    let mut cam = EulerCamera::new(1.0, Vec3::new(1.0, 2.0, 3.0));
    cam.yaw = 60.0;
    let start = cam.position;
    cam.process_keyboard(&held(&[KeyCode::KeyW]), 100.0, Vec3::ONE);
    let ahead = cam.view_matrix().transform_point3(start + (cam.position - start) * 10.0);
    // Points ahead of the camera lie on the negative Z axis in eye space
    assert!(ahead.x.abs() < EPSILON && ahead.y.abs() < EPSILON);
    assert!(ahead.z < 0.0);
  }

  #[test]
  fn projection_flips_y_and_uses_zero_to_one_depth() {
    let cam = EulerCamera::new(1.0, Vec3::ZERO);
    let proj = cam.projection_matrix();

    let above = proj.project_point3(Vec3::new(0.0, 1.0, -5.0));
    assert!(above.y < 0.0);

    let near = proj.project_point3(Vec3::new(0.0, 0.0, -cam.z_near));
    let far = proj.project_point3(Vec3::new(0.0, 0.0, -cam.z_far));
    assert!(near.z.abs() < EPSILON);
    assert!((far.z - 1.0).abs() < EPSILON);
  }
}
