//! Engine configuration: store locations, thresholds and pattern sets.
//!
//! Built once per invocation and passed by reference; nothing here is global.

use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::patterns::Signals;
use crate::policy::{HealthPolicy, RecurrencePolicy};

/// Error history store, relative to the project root.
pub const ERROR_STORE_PATH: &str = ".claude/pain-points/ai-error-history.json";
/// Skill metrics store, relative to the project root.
pub const SKILL_STORE_PATH: &str = ".claude/skills/skill-metrics.json";
/// Tool name the host uses for skill invocations.
pub const SKILL_TOOL_NAME: &str = "Skill";

/// How much of the body the fingerprint looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
  /// Leading characters scanned for the context token.
  pub scan_chars: usize,
  /// Max characters kept from the context token.
  pub max_chars: usize,
}

impl Default for ContextWindow {
  fn default() -> Self {
    Self {
      scan_chars: 100,
      max_chars: 30,
    }
  }
}

/// Bounds on the debugging history kept per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
  /// Leading characters of the body stored as a sample.
  pub sample_chars: usize,
  /// Samples kept per error record (oldest evicted).
  pub samples: usize,
  /// Distinct failure snippets kept per skill record.
  pub failure_contexts: usize,
}

impl Default for Retention {
  fn default() -> Self {
    Self {
      sample_chars: 200,
      samples: 5,
      failure_contexts: 5,
    }
  }
}

/// Everything one invocation needs.
#[derive(Debug, Clone)]
pub struct Config {
  pub error_store: PathBuf,
  pub skill_store: PathBuf,
  pub skill_tool_name: String,
  pub context_window: ContextWindow,
  pub retention: Retention,
  pub recurrence: RecurrencePolicy,
  pub skill_health: HealthPolicy,
  pub signals: Signals,
}

impl Config {
  /// Default thresholds with both stores rooted under `root`.
  pub fn for_project(root: &Path) -> Result<Self, EngineError> {
    Ok(Self {
      error_store: root.join(ERROR_STORE_PATH),
      skill_store: root.join(SKILL_STORE_PATH),
      skill_tool_name: SKILL_TOOL_NAME.to_string(),
      context_window: ContextWindow::default(),
      retention: Retention::default(),
      recurrence: RecurrencePolicy::default(),
      skill_health: HealthPolicy::default(),
      signals: Signals::builtin()?,
    })
  }
}
