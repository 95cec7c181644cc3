//! Structured error types for the signal engine.
//!
//! None of these ever reach the Caller: the driver maps every `Err` to the
//! empty response. They exist so each stage can say what went wrong in logs.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("io: {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("pattern {name}: {source}")]
  Pattern {
    name: String,
    #[source]
    source: regex::Error,
  },
}

impl EngineError {
  pub fn io(path: &Path, source: std::io::Error) -> Self {
    Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  pub fn pattern(name: &str, source: regex::Error) -> Self {
    Self::Pattern {
      name: name.to_string(),
      source,
    }
  }
}
