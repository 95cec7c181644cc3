//! Durable JSON aggregate stores: error history and skill metrics.
//!
//! A store is read in full, mutated in memory and rewritten in full. There is
//! no locking; concurrent invocations are last-writer-wins. `save` replaces
//! the file by rename so a reader never sees a half-written document.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::types::Outcome;

/// Version tag written into new store documents.
pub const STORE_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// UTC instant stored as RFC 3339. Also reads naive ISO-8601 (assumed UTC),
/// which older store files contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
  pub fn parse(s: &str) -> Option<Self> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
      return Some(Self(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
      .ok()
      .map(|naive| Self(naive.and_utc()))
  }
}

impl From<DateTime<Utc>> for Timestamp {
  fn from(dt: DateTime<Utc>) -> Self {
    Self(dt)
  }
}

impl Serialize for Timestamp {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.0.to_rfc3339())
  }
}

impl<'de> Deserialize<'de> for Timestamp {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Self::parse(&raw)
      .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
  }
}

// ---------------------------------------------------------------------------
// Store document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
  pub created: Timestamp,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated: Option<Timestamp>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

/// Key → record mapping plus store-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store<R> {
  #[serde(default = "BTreeMap::new", alias = "errors", alias = "skills")]
  pub records: BTreeMap<String, R>,
  pub metadata: Metadata,
}

impl<R> Store<R> {
  /// Empty store created at `now`.
  pub fn fresh(now: DateTime<Utc>) -> Self {
    Self {
      records: BTreeMap::new(),
      metadata: Metadata {
        created: now.into(),
        updated: None,
        version: Some(STORE_VERSION.to_string()),
      },
    }
  }

  pub fn get(&self, key: &str) -> Option<&R> {
    self.records.get(key)
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

impl<R: Serialize + DeserializeOwned> Store<R> {
  /// Load the store at `path`. Missing, unreadable or corrupt files all
  /// yield a fresh store; nothing propagates.
  pub fn load(path: &Path, now: DateTime<Utc>) -> Self {
    match Self::read(path) {
      Ok(Some(store)) => store,
      Ok(None) => Self::fresh(now),
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "discarding unreadable store");
        Self::fresh(now)
      }
    }
  }

  fn read(path: &Path) -> Result<Option<Self>, EngineError> {
    let bytes = match fs::read(path) {
      Ok(b) => b,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(EngineError::io(path, e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
  }

  /// Touch `metadata.updated` and rewrite the whole document, creating
  /// parent directories as needed.
  pub fn save(&mut self, path: &Path, now: DateTime<Utc>) -> Result<(), EngineError> {
    self.metadata.updated = Some(now.into());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    let bytes = serde_json::to_vec_pretty(self)?;
    let tmp = temp_path(path)?;
    let result = fs::write(&tmp, &bytes)
      .map_err(|e| EngineError::io(&tmp, e))
      .and_then(|()| fs::rename(&tmp, path).map_err(|e| EngineError::io(path, e)));
    if result.is_err() {
      let _ = fs::remove_file(&tmp);
    }
    result
  }
}

/// Sibling temp file, unique per process so racing writers don't share it.
fn temp_path(path: &Path) -> Result<PathBuf, EngineError> {
  let name = path.file_name().ok_or_else(|| {
    EngineError::io(
      path,
      std::io::Error::new(ErrorKind::InvalidInput, "store path has no file name"),
    )
  })?;
  Ok(path.with_file_name(format!(
    ".{}.{}.tmp",
    name.to_string_lossy(),
    std::process::id()
  )))
}

// ---------------------------------------------------------------------------
// Error history records
// ---------------------------------------------------------------------------

/// Running summary of one fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
  pub count: u64,
  pub first_seen: Timestamp,
  pub last_seen: Timestamp,
  #[serde(alias = "tool")]
  pub source: String,
  /// Most recent raw samples, oldest first. For humans only.
  #[serde(default, alias = "contexts")]
  pub samples: VecDeque<String>,
  /// Fields written by other tools; kept as-is.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ErrorRecord {
  fn new(source: &str, now: DateTime<Utc>) -> Self {
    Self {
      count: 1,
      first_seen: now.into(),
      last_seen: now.into(),
      source: source.to_string(),
      samples: VecDeque::new(),
      extra: Map::new(),
    }
  }

  fn push_sample(&mut self, sample: &str, capacity: usize) {
    self.samples.push_back(sample.to_string());
    while self.samples.len() > capacity {
      self.samples.pop_front();
    }
  }
}

impl Store<ErrorRecord> {
  /// Record one occurrence of `key`. Returns the updated record and whether
  /// it was created by this call.
  pub fn upsert(
    &mut self,
    key: &str,
    sample: &str,
    source: &str,
    now: DateTime<Utc>,
    capacity: usize,
  ) -> (&ErrorRecord, bool) {
    let is_new = !self.records.contains_key(key);
    let record = self
      .records
      .entry(key.to_string())
      .or_insert_with(|| ErrorRecord::new(source, now));
    if !is_new {
      record.count += 1;
      record.last_seen = now.into();
    }
    record.push_sample(sample, capacity);
    (record, is_new)
  }
}

// ---------------------------------------------------------------------------
// Skill metrics records
// ---------------------------------------------------------------------------

fn full_rate() -> f64 {
  100.0
}

/// Outcome tallies for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
  pub invocations: u64,
  pub successes: u64,
  pub failures: u64,
  #[serde(default)]
  pub partials: u64,
  pub first_invoked: Timestamp,
  #[serde(default)]
  pub last_invoked: Option<Timestamp>,
  /// Distinct recent failure snippets, oldest first.
  #[serde(default)]
  pub failure_patterns: Vec<String>,
  #[serde(default = "full_rate")]
  pub success_rate: f64,
  /// Written by the external skill reviewer.
  #[serde(default)]
  pub improvements: Vec<Value>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl SkillRecord {
  fn new(now: DateTime<Utc>) -> Self {
    Self {
      invocations: 0,
      successes: 0,
      failures: 0,
      partials: 0,
      first_invoked: now.into(),
      last_invoked: None,
      failure_patterns: Vec::new(),
      success_rate: full_rate(),
      improvements: Vec::new(),
      extra: Map::new(),
    }
  }

  /// Successes plus failures; partial runs are not evidence either way.
  pub fn decisive(&self) -> u64 {
    self.successes + self.failures
  }

  /// successes / decisive × 100, one decimal. 100.0 with no decisive runs.
  pub fn compute_success_rate(&self) -> f64 {
    let decisive = self.decisive();
    if decisive == 0 {
      return full_rate();
    }
    let rate = self.successes as f64 / decisive as f64 * 100.0;
    (rate * 10.0).round() / 10.0
  }

  fn remember_failure(&mut self, snippet: String, capacity: usize) {
    if !self.failure_patterns.contains(&snippet) {
      self.failure_patterns.push(snippet);
    }
    let overflow = self.failure_patterns.len().saturating_sub(capacity);
    self.failure_patterns.drain(..overflow);
  }
}

impl Store<SkillRecord> {
  /// Count one invocation of `skill` with the given outcome.
  ///
  /// `failure_context` is only kept for negative outcomes.
  pub fn record_outcome(
    &mut self,
    skill: &str,
    outcome: Outcome,
    failure_context: Option<String>,
    now: DateTime<Utc>,
    capacity: usize,
  ) -> &SkillRecord {
    let record = self
      .records
      .entry(skill.to_string())
      .or_insert_with(|| SkillRecord::new(now));
    record.invocations += 1;
    record.last_invoked = Some(now.into());
    match outcome {
      Outcome::Positive => record.successes += 1,
      Outcome::Negative => {
        record.failures += 1;
        if let Some(snippet) = failure_context {
          record.remember_failure(snippet, capacity);
        }
      }
      Outcome::Indeterminate => record.partials += 1,
    }
    record.success_rate = record.compute_success_rate();
    record
  }
}
