//! Core engine: decodes one hook event, updates the relevant store, and
//! answers with at most one advisory. Never fails outward.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::classify;
use crate::config::Config;
use crate::error::EngineError;
use crate::fingerprint;
use crate::policy::{self, Advisory};
use crate::store::{ErrorRecord, SkillRecord, Store};
use crate::types::*;

/// Which hook this invocation serves. Each owns one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
  /// Fingerprint error-looking tool output and flag recurrences.
  ErrorDetector,
  /// Tally skill outcomes and flag struggling skills.
  SkillMonitor,
}

/// The signal engine. Holds configuration only; state lives in the stores.
pub struct Engine {
  config: Config,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn for_project(root: &Path) -> Result<Self, EngineError> {
    Ok(Self::new(Config::for_project(root)?))
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Process one event. Absent bodies and non-matching events are no-ops.
  pub fn process(&self, hook: Hook, input: &ParsedInput, now: DateTime<Utc>) -> HookResponse {
    let advisory = match hook {
      Hook::ErrorDetector => self.detect_error(input, now),
      Hook::SkillMonitor => self.monitor_skill(input, now),
    };
    match advisory {
      Some(a) => HookResponse::with_advisory(a.to_string()),
      None => HookResponse::empty(),
    }
  }

  fn detect_error(&self, input: &ParsedInput, now: DateTime<Utc>) -> Option<Advisory> {
    let body = input.body.present()?;
    let errors = &self.config.signals.errors;
    let matched = errors.matches(body);
    tracing::debug!(set = %errors.name, ?matched, "scanned tool output");
    if matched.is_empty() {
      return None;
    }

    let source = input.source_or_unknown();
    let fp = fingerprint::compute(source, &matched, body, &self.config.context_window);
    let sample = leading(body, self.config.retention.sample_chars);

    let path = &self.config.error_store;
    let mut store: Store<ErrorRecord> = Store::load(path, now);
    let (record, is_new) = store.upsert(fp.as_str(), sample, source, now, self.config.retention.samples);
    tracing::debug!(fingerprint = %fp, count = record.count, is_new, "recorded error occurrence");

    let advisory = policy::evaluate(&self.config.recurrence, fp.as_str(), record);
    persist(&mut store, path, now);
    advisory
  }

  fn monitor_skill(&self, input: &ParsedInput, now: DateTime<Utc>) -> Option<Advisory> {
    if input.source.present()? != &self.config.skill_tool_name {
      return None;
    }
    let body = input.body.present()?;
    let skill = input
      .skill
      .present()
      .map(String::as_str)
      .unwrap_or(UNKNOWN_SOURCE);

    let signals = &self.config.signals;
    let outcome = classify::classify(body, &signals.failures, &signals.successes);
    let snippet = match outcome {
      Outcome::Negative => Some(
        classify::failure_snippet(body, &signals.failures)
          .unwrap_or_else(|| fingerprint::UNKNOWN_CONTEXT.to_string()),
      ),
      Outcome::Positive | Outcome::Indeterminate => None,
    };

    let path = &self.config.skill_store;
    let mut store: Store<SkillRecord> = Store::load(path, now);
    let record = store.record_outcome(
      skill,
      outcome,
      snippet,
      now,
      self.config.retention.failure_contexts,
    );
    tracing::debug!(
      skill,
      ?outcome,
      success_rate = record.success_rate,
      "recorded skill outcome"
    );

    let advisory = policy::evaluate(&self.config.skill_health, skill, record);
    persist(&mut store, path, now);
    advisory
  }
}

/// Best-effort save: a lost update is logged, the response still goes out.
fn persist<R>(store: &mut Store<R>, path: &Path, now: DateTime<Utc>)
where
  R: serde::Serialize + serde::de::DeserializeOwned,
{
  if let Err(e) = store.save(path, now) {
    tracing::warn!(path = %path.display(), error = %e, "store update lost");
  }
}

/// Leading `max_chars` characters of `text`.
fn leading(text: &str, max_chars: usize) -> &str {
  match text.char_indices().nth(max_chars) {
    Some((i, _)) => &text[..i],
    None => text,
  }
}

/// Collapse any failure into the empty response.
pub fn fail_open(result: Result<HookResponse, EngineError>) -> HookResponse {
  result.unwrap_or_else(|e| {
    tracing::warn!(error = %e, "signal engine failed, allowing");
    HookResponse::empty()
  })
}

/// Full invocation: decode `raw`, build the engine for `root`, process.
pub fn run(hook: Hook, raw: &str, root: &Path, now: DateTime<Utc>) -> HookResponse {
  let input = ParsedInput::decode(raw);
  fail_open(Engine::for_project(root).map(|engine| engine.process(hook, &input, now)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use tempfile::TempDir;

  fn ts(min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, min, 0).unwrap()
  }

  fn engine(dir: &TempDir) -> Engine {
    Engine::for_project(dir.path()).unwrap()
  }

  fn bash(body: &str) -> ParsedInput {
    ParsedInput {
      source: Field::Present("Bash".into()),
      body: Field::Present(body.into()),
      skill: Field::Absent,
    }
  }

  fn skill_run(skill: &str, body: &str) -> ParsedInput {
    ParsedInput {
      source: Field::Present("Skill".into()),
      body: Field::Present(body.into()),
      skill: Field::Present(skill.into()),
    }
  }

  #[test]
  fn absent_body_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let input = ParsedInput {
      source: Field::Present("Bash".into()),
      ..ParsedInput::default()
    };
    assert!(engine.process(Hook::ErrorDetector, &input, ts(0)).is_empty());
    assert!(!engine.config().error_store.exists());

    let input = ParsedInput {
      source: Field::Present("Skill".into()),
      ..ParsedInput::default()
    };
    assert!(engine.process(Hook::SkillMonitor, &input, ts(0)).is_empty());
    assert!(!engine.config().skill_store.exists());
  }

  #[test]
  fn clean_output_short_circuits() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let response = engine.process(Hook::ErrorDetector, &bash("compiled 3 crates"), ts(0));
    assert!(response.is_empty());
    assert!(!engine.config().error_store.exists());
  }

  #[test]
  fn first_error_is_silent_second_is_advised() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let input = bash("permission denied: /etc/shadow");

    let first = engine.process(Hook::ErrorDetector, &input, ts(0));
    assert!(first.is_empty());

    let second = engine.process(Hook::ErrorDetector, &input, ts(1));
    let text = second.advisory.unwrap();
    assert!(text.contains("[BASH]-[DENIED]-[permission]"));
    assert!(text.contains("#2"));

    let store: Store<ErrorRecord> = Store::load(&engine.config().error_store, ts(9));
    let record = store.get("[BASH]-[DENIED]-[permission]").unwrap();
    assert_eq!(record.count, 2);
    assert_eq!(record.samples.len(), 2);
  }

  #[test]
  fn samples_are_truncated() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let body = format!("error {}", "z".repeat(500));
    engine.process(Hook::ErrorDetector, &bash(&body), ts(0));
    let store: Store<ErrorRecord> = Store::load(&engine.config().error_store, ts(0));
    let record = store.records.values().next().unwrap();
    assert_eq!(record.samples[0].chars().count(), 200);
  }

  #[test]
  fn missing_source_is_unknown() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let input = ParsedInput {
      body: Field::Present("timeout".into()),
      ..ParsedInput::default()
    };
    engine.process(Hook::ErrorDetector, &input, ts(0));
    let store: Store<ErrorRecord> = Store::load(&engine.config().error_store, ts(0));
    assert!(store.get("[UNKNOWN]-[TIMEOUT]-[timeout]").is_some());
    assert_eq!(store.get("[UNKNOWN]-[TIMEOUT]-[timeout]").unwrap().source, "unknown");
  }

  #[test]
  fn skill_monitor_ignores_other_tools() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let response = engine.process(Hook::SkillMonitor, &bash("failed"), ts(0));
    assert!(response.is_empty());
    assert!(!engine.config().skill_store.exists());
  }

  #[test]
  fn skill_health_alert_after_two_of_three_fail() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    assert!(engine
      .process(Hook::SkillMonitor, &skill_run("pdf", "report created"), ts(0))
      .is_empty());
    // One failure: 1 success / 1 failure, under the sample minimum.
    assert!(engine
      .process(Hook::SkillMonitor, &skill_run("pdf", "conversion failed"), ts(1))
      .is_empty());
    let third = engine.process(Hook::SkillMonitor, &skill_run("pdf", "unable to open file"), ts(2));
    let text = third.advisory.unwrap();
    assert!(text.contains("Skill health alert"));
    assert!(text.contains("`pdf`"));
    assert!(text.contains("33.3%"));

    let store: Store<SkillRecord> = Store::load(&engine.config().skill_store, ts(9));
    let record = store.get("pdf").unwrap();
    assert_eq!(record.invocations, 3);
    assert_eq!(record.failure_patterns.len(), 2);
  }

  #[test]
  fn partial_run_is_recorded_without_advisory() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let response = engine.process(Hook::SkillMonitor, &skill_run("pdf", "here you go"), ts(0));
    assert!(response.is_empty());
    let store: Store<SkillRecord> = Store::load(&engine.config().skill_store, ts(0));
    assert_eq!(store.get("pdf").unwrap().partials, 1);
  }

  #[test]
  fn unwritable_store_still_answers() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::for_project(dir.path()).unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    config.error_store = blocker.join("history.json");
    config.recurrence.threshold = 1;
    let engine = Engine::new(config);
    let response = engine.process(Hook::ErrorDetector, &bash("fatal error"), ts(0));
    assert!(response.advisory.is_some());
  }

  #[test]
  fn fail_open_maps_errors_to_empty() {
    let err = EngineError::Json(serde_json::from_str::<u8>("x").unwrap_err());
    assert!(fail_open(Err(err)).is_empty());
  }

  #[test]
  fn leading_respects_char_boundaries() {
    assert_eq!(leading("héllo", 2), "hé");
    assert_eq!(leading("hi", 10), "hi");
  }
}
