//! Error types for model loading and command-line configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while reading or packing an OBJ model.
#[derive(Debug, Error)]
pub enum ModelError {
  #[error("failed to read OBJ model from {path}")]
  Read {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to load OBJ model from {path}")]
  Load {
    path:   PathBuf,
    #[source]
    source: tobj::LoadError,
  },

  #[error("failed to parse OBJ data")]
  Parse(#[from] tobj::LoadError),

  #[error("failed to read OBJ data")]
  Io(#[from] std::io::Error),

  #[error("model contains no triangles")]
  Empty,

  #[error("face {face} references {kind} {index}, but only {len} are defined")]
  IndexOutOfRange {
    face:  usize,
    kind:  &'static str,
    index: u32,
    len:   usize,
  },
}

/// Malformed command-line flag.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
  #[error("invalid value '{value}' for --{flag}")]
  InvalidValue { flag: &'static str, value: String },

  #[error("window dimensions must be non-zero, got {width}x{height}")]
  ZeroSize { width: u32, height: u32 },
}
