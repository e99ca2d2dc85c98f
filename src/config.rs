//! Demo settings and command-line parsing.
//!
//! Every field defaults to the value the demo was built around, so running the
//! binary without arguments shows the stock scene. Recognised flags:
//! * `--model=PATH` - OBJ file to display
//! * `--size=WxH`, `--width=W`, `--height=H` - initial window size
//! * `--vsync=on|off` - FIFO presentation or the lowest-latency mode available
//! * `--fov=DEG` - vertical field of view, clamped to 30..=120

use std::path::PathBuf;

use glam::Vec3;

use crate::error::ConfigError;

pub const DEFAULT_MODEL_LOCATION: &str = "res/models/cube.obj";
pub const WINDOW_TITLE: &str = "Core Lighting Demo";

const MIN_FOV: f32 = 30.0;
const MAX_FOV: f32 = 120.0;

#[derive(Clone, Debug, PartialEq)]
pub struct DemoConfig {
  pub model_path:      PathBuf,
  pub window_width:    u32,
  pub window_height:   u32,
  pub vsync:           bool,
  pub camera_position: Vec3,
  pub fov:             f32,
  pub ambient_light:   f32,
  pub diffuse_colour:  [f32; 3],
  pub shininess:       f32,
  /// Mouse look multiplier.
  pub mouse_speed:     f32,
  /// Pitch limits in degrees, positive looks down.
  pub max_look_up:     f32,
  pub max_look_down:   f32,
  /// Per-axis keyboard movement multipliers (strafe, vertical, forward).
  pub move_speed:      Vec3,
}

impl Default for DemoConfig {
  fn default() -> Self {
    Self {
      model_path:      PathBuf::from(DEFAULT_MODEL_LOCATION),
      window_width:    640,
      window_height:   480,
      vsync:           true,
      camera_position: Vec3::new(-2.19, 1.36, 11.45),
      fov:             70.0,
      ambient_light:   0.05,
      diffuse_colour:  [0.4, 0.27, 0.17],
      shininess:       10.0,
      mouse_speed:     1.0,
      max_look_up:     80.0,
      max_look_down:   -80.0,
      move_speed:      Vec3::ONE,
    }
  }
}

impl DemoConfig {
  /// Builds a configuration from command-line style arguments.
  ///
  /// The first item is treated like any other argument, so pass
  /// `std::env::args().skip(1)` from `main`.
  ///
  /// ```
  /// use core_lighting::DemoConfig;
  ///
  /// let config = DemoConfig::from_args(["--size=800x600", "--vsync=off"]).unwrap();
  /// assert_eq!((config.window_width, config.window_height), (800, 600));
  /// assert!(!config.vsync);
  /// ```
  pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut config = Self::default();

    for arg in args {
      let arg = arg.as_ref();
      if let Some(v) = arg.strip_prefix("--model=") {
        if v.is_empty() {
          return Err(invalid("model", v));
        }
        config.model_path = PathBuf::from(v);
      } else if let Some(v) = arg.strip_prefix("--size=") {
        let (w, h) = v
          .split_once('x')
          .or_else(|| v.split_once('X'))
          .ok_or_else(|| invalid("size", v))?;
        config.window_width = parse_number("size", w)?;
        config.window_height = parse_number("size", h)?;
      } else if let Some(v) = arg.strip_prefix("--width=") {
        config.window_width = parse_number("width", v)?;
      } else if let Some(v) = arg.strip_prefix("--height=") {
        config.window_height = parse_number("height", v)?;
      } else if let Some(v) = arg.strip_prefix("--vsync=") {
        config.vsync = match v.to_ascii_lowercase().as_str() {
          "1" | "true" | "on" | "yes" => true,
          "0" | "false" | "off" | "no" => false,
          _ => return Err(invalid("vsync", v)),
        };
      } else if let Some(v) = arg.strip_prefix("--fov=") {
        let fov: f32 = parse_number("fov", v)?;
        if !fov.is_finite() {
          return Err(invalid("fov", v));
        }
        config.fov = fov.clamp(MIN_FOV, MAX_FOV);
      } else {
        log::warn!("Ignoring unknown argument '{arg}'");
      }
    }

    if config.window_width == 0 || config.window_height == 0 {
      return Err(ConfigError::ZeroSize {
        width:  config.window_width,
        height: config.window_height,
      });
    }

    Ok(config)
  }
}

fn invalid(flag: &'static str, value: &str) -> ConfigError {
  ConfigError::InvalidValue {
    flag,
    value: value.to_owned(),
  }
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, value: &str) -> Result<T, ConfigError> {
  value.trim().parse().map_err(|_| invalid(flag, value))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_arguments_gives_demo_defaults() {
    let config = DemoConfig::from_args(Vec::<String>::new()).unwrap();
    assert_eq!(config, DemoConfig::default());
    assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_LOCATION));
    assert_eq!((config.window_width, config.window_height), (640, 480));
    assert!(config.vsync);
  }

  #[test]
  fn size_flag_accepts_either_separator() {
    let config = DemoConfig::from_args(["--size=1024X768"]).unwrap();
    assert_eq!((config.window_width, config.window_height), (1024, 768));
  }

  #[test]
  fn later_flags_override_earlier_ones() {
    let config = DemoConfig::from_args(["--size=800x600", "--height=700"]).unwrap();
    assert_eq!((config.window_width, config.window_height), (800, 700));
  }

  #[test]
  fn model_path_is_taken_verbatim() {
    let config = DemoConfig::from_args(["--model=res/models/bunny.obj"]).unwrap();
    assert_eq!(config.model_path, PathBuf::from("res/models/bunny.obj"));
  }

  #[test]
  fn fov_is_clamped() {
    let wide = DemoConfig::from_args(["--fov=170"]).unwrap();
    assert_eq!(wide.fov, 120.0);
    let narrow = DemoConfig::from_args(["--fov=5"]).unwrap();
    assert_eq!(narrow.fov, 30.0);
  }

  #[test]
  fn malformed_values_are_rejected() {
    assert_eq!(
      DemoConfig::from_args(["--width=wide"]),
      Err(ConfigError::InvalidValue {
        flag:  "width",
        value: "wide".into(),
      })
    );
    assert!(DemoConfig::from_args(["--size=800"]).is_err());
    assert!(DemoConfig::from_args(["--vsync=maybe"]).is_err());
    assert!(DemoConfig::from_args(["--fov=NaN"]).is_err());
  }

  #[test]
  fn zero_sized_window_is_rejected() {
    assert_eq!(
      DemoConfig::from_args(["--width=0"]),
      Err(ConfigError::ZeroSize {
        width:  0,
        height: 480,
      })
    );
  }

  #[test]
  fn unknown_flags_are_ignored() {
    let config = DemoConfig::from_args(["--fullscreen", "--vsync=off"]).unwrap();
    assert!(!config.vsync);
  }
}
