//! Overlay drawn with egui.
//!
//! Shows frame statistics and the camera pose, and exposes the lighting
//! parameters so the Phong terms can be tuned while the model is on screen.

use std::time::{Duration, Instant};

use egui_winit_vulkano::Gui;

use crate::render::{
  camera::EulerCamera,
  lighting::{LightMode, LightingParams},
};

/// Frame timing with a once-per-second average.
#[derive(Clone, Copy, Debug)]
pub struct FrameStats {
  /// Frames per second of the latest frame
  pub fps:          f32,
  /// Average frames per second over the last full second
  pub avg_fps:      f32,
  /// Duration of the latest frame in seconds
  pub frame_time:   f32,
  frame_count:      u32,
  time_accumulator: f32,
  last_frame_time:  Instant,
  last_avg_update:  Instant,
}

impl FrameStats {
  pub fn new(now: Instant) -> Self {
    Self {
      fps: 0.0,
      avg_fps: 0.0,
      frame_time: 0.0,
      frame_count: 0,
      time_accumulator: 0.0,
      last_frame_time: now,
      last_avg_update: now,
    }
  }

  /// Records a frame finishing at `now`.
  pub fn tick(&mut self, now: Instant) {
    let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
    self.frame_time = frame_time;
    self.fps = if frame_time > 0.0 { 1.0 / frame_time } else { 0.0 };
    self.time_accumulator += frame_time;
    self.frame_count += 1;

    if now.duration_since(self.last_avg_update) >= Duration::from_secs(1) {
      if self.time_accumulator > 0.0 {
        self.avg_fps = self.frame_count as f32 / self.time_accumulator;
      }
      self.frame_count = 0;
      self.time_accumulator = 0.0;
      self.last_avg_update = now;
    }

    self.last_frame_time = now;
  }
}

/// Values the overlay edits, mirrored from the app every frame.
#[derive(Clone, Copy, Debug)]
pub struct GuiState {
  pub stats:              FrameStats,
  pub lighting:           LightingParams,
  pub wireframe_mode:     bool,
  /// Whether the device can rasterize lines
  pub supports_wireframe: bool,
}

impl GuiState {
  pub fn new(lighting: LightingParams, supports_wireframe: bool) -> Self {
    Self {
      stats: FrameStats::new(Instant::now()),
      lighting,
      wireframe_mode: false,
      supports_wireframe,
    }
  }
}

/// Edits made in the overlay this frame, applied by the app afterwards.
#[derive(Debug, Default)]
pub struct GuiStateChanges {
  pub lighting:            Option<LightingParams>,
  pub wireframe_mode:      Option<bool>,
  pub camera_reset:        bool,
  /// False while egui wants the pointer or keyboard
  pub pass_events_to_game: bool,
}

/// Lays out the overlay for this frame.
pub fn draw_gui(gui: &mut Gui, state: &mut GuiState, camera: &EulerCamera) -> GuiStateChanges {
  let mut changes = GuiStateChanges::default();
  state.stats.tick(Instant::now());

  gui.immediate_ui(|gui| {
    let ctx = gui.context();
    changes.pass_events_to_game = !ctx.wants_pointer_input() && !ctx.wants_keyboard_input();

    egui::Window::new("Lighting")
      .default_pos([10.0, 10.0])
      .show(&ctx, |ui| {
        ui.heading("Performance");
        ui.label(format!("FPS: {:.1}", state.stats.fps));
        ui.label(format!("Avg FPS: {:.1}", state.stats.avg_fps));
        ui.label(format!("Frame Time: {:.2}ms", state.stats.frame_time * 1000.0));

        ui.separator();

        ui.heading("Camera");
        ui.label(format!(
          "Position: {:.2}, {:.2}, {:.2}",
          camera.position.x, camera.position.y, camera.position.z
        ));
        ui.label(format!("Yaw: {:.1}°  Pitch: {:.1}°", camera.yaw, camera.pitch));
        if ui.button("Reset Camera").clicked() {
          changes.camera_reset = true;
        }

        ui.separator();

        ui.heading("Material");
        let lighting = &mut state.lighting;
        let mut edited = false;
        edited |= ui
          .add(egui::Slider::new(&mut lighting.ambient, 0.0..=1.0).text("Ambient"))
          .changed();
        edited |= ui
          .add(
            egui::Slider::new(&mut lighting.shininess, 1.0..=128.0)
              .logarithmic(true)
              .text("Shininess"),
          )
          .changed();
        ui.horizontal(|ui| {
          ui.label("Diffuse:");
          edited |= ui.color_edit_button_rgb(&mut lighting.diffuse_colour).changed();
          ui.label("Specular:");
          edited |= ui.color_edit_button_rgb(&mut lighting.specular_colour).changed();
        });

        let mut headlight = lighting.light == LightMode::Headlight;
        if ui.checkbox(&mut headlight, "Light follows camera").changed() {
          // Dropping the headlight parks the light where the camera is now
          lighting.light = if headlight {
            LightMode::Headlight
          } else {
            LightMode::Fixed(camera.position)
          };
          edited = true;
        }
        if edited {
          changes.lighting = Some(*lighting);
        }

        ui.separator();

        ui.heading("Rendering");
        ui.add_enabled_ui(state.supports_wireframe, |ui| {
          if ui
            .checkbox(&mut state.wireframe_mode, "Wireframe Mode")
            .changed()
          {
            changes.wireframe_mode = Some(state.wireframe_mode);
          }
        });

        ui.separator();

        ui.heading("Controls");
        ui.label("Left click - capture mouse");
        ui.label("Right click / Esc - release mouse");
        ui.label("WASD / arrows - move");
        ui.label("Space/Shift - move up/down");
      });
  });

  changes
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fps_reflects_last_frame() {
    let start = Instant::now();
    let mut stats = FrameStats::new(start);
    stats.tick(start + Duration::from_millis(20));
    assert!((stats.fps - 50.0).abs() < 0.01);
    assert!((stats.frame_time - 0.02).abs() < 1e-6);
    assert_eq!(stats.avg_fps, 0.0);
  }

  #[test]
  fn average_updates_once_per_second() {
    let start = Instant::now();
    let mut stats = FrameStats::new(start);
    for frame in 1..=40 {
      stats.tick(start + Duration::from_millis(25 * frame));
    }
    assert!((stats.avg_fps - 40.0).abs() < 0.01);
  }

  #[test]
  fn zero_length_frame_does_not_divide_by_zero() {
    let start = Instant::now();
    let mut stats = FrameStats::new(start);
    stats.tick(start);
    assert_eq!(stats.fps, 0.0);
    assert!(stats.fps.is_finite());
  }
}
