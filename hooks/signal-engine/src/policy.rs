//! Threshold policies that turn an updated record into at most one advisory.

use std::fmt;

use crate::store::{ErrorRecord, SkillRecord};

/// A human-readable note attached to the hook response.
#[derive(Debug, Clone, PartialEq)]
pub enum Advisory {
  Recurring { fingerprint: String, count: u64 },
  SkillHealth { skill: String, success_rate: f64 },
  RepeatedFailures { skill: String, failures: u64 },
}

impl fmt::Display for Advisory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Recurring { fingerprint, count } => write!(
        f,
        "**Recurring error detected** (occurrence #{}): `{}`\nConsider using ai-error-learner to catalog this pattern.",
        count, fingerprint
      ),
      Self::SkillHealth {
        skill,
        success_rate,
      } => write!(
        f,
        "**Skill health alert**: `{}` has {:.1}% success rate. Consider using skill-improver.",
        skill, success_rate
      ),
      Self::RepeatedFailures { skill, failures } => write!(
        f,
        "**Skill has {} failures** (`{}`). Consider reviewing with skill-improver.",
        failures, skill
      ),
    }
  }
}

/// Compare a freshly updated record against static thresholds.
pub trait Policy {
  type Record;

  fn evaluate(&self, key: &str, record: &Self::Record) -> Option<Advisory>;
}

/// Run `policy` against the record stored under `key`.
pub fn evaluate<P: Policy>(policy: &P, key: &str, record: &P::Record) -> Option<Advisory> {
  policy.evaluate(key, record)
}

/// Remind on every occurrence once a fingerprint has recurred `threshold` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrencePolicy {
  pub threshold: u64,
}

impl Default for RecurrencePolicy {
  fn default() -> Self {
    Self { threshold: 2 }
  }
}

impl Policy for RecurrencePolicy {
  type Record = ErrorRecord;

  fn evaluate(&self, key: &str, record: &ErrorRecord) -> Option<Advisory> {
    (record.count >= self.threshold).then(|| Advisory::Recurring {
      fingerprint: key.to_string(),
      count: record.count,
    })
  }
}

/// Low success rate (given enough samples) first, then raw failure count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthPolicy {
  /// Decisive outcomes needed before the rate is trusted.
  pub min_samples: u64,
  /// Rates strictly below this percentage alert.
  pub success_floor: f64,
  /// Failures that alert regardless of rate.
  pub min_failures: u64,
}

impl Default for HealthPolicy {
  fn default() -> Self {
    Self {
      min_samples: 3,
      success_floor: 80.0,
      min_failures: 2,
    }
  }
}

impl Policy for HealthPolicy {
  type Record = SkillRecord;

  fn evaluate(&self, key: &str, record: &SkillRecord) -> Option<Advisory> {
    if record.decisive() >= self.min_samples && record.success_rate < self.success_floor {
      Some(Advisory::SkillHealth {
        skill: key.to_string(),
        success_rate: record.success_rate,
      })
    } else if record.failures >= self.min_failures {
      Some(Advisory::RepeatedFailures {
        skill: key.to_string(),
        failures: record.failures,
      })
    } else {
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::Store;
  use crate::types::Outcome;
  use chrono::{TimeZone, Utc};

  fn error_store_with(count: u64) -> Store<ErrorRecord> {
    let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
    let mut store = Store::fresh(now);
    for _ in 0..count {
      store.upsert("[BASH]-[ERROR]-[npm]", "npm ERR!", "Bash", now, 5);
    }
    store
  }

  fn skill_record(outcomes: &[Outcome]) -> SkillRecord {
    let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
    let mut store = Store::fresh(now);
    for &o in outcomes {
      store.record_outcome("pdf", o, Some("failed".into()), now, 5);
    }
    store.get("pdf").unwrap().clone()
  }

  #[test]
  fn recurrence_silent_below_threshold() {
    let store = error_store_with(1);
    let record = store.get("[BASH]-[ERROR]-[npm]").unwrap();
    assert_eq!(evaluate(&RecurrencePolicy::default(), "[BASH]-[ERROR]-[npm]", record), None);
  }

  #[test]
  fn recurrence_fires_at_and_above_threshold() {
    for n in 2..=4 {
      let store = error_store_with(n);
      let record = store.get("[BASH]-[ERROR]-[npm]").unwrap();
      let advisory = evaluate(&RecurrencePolicy::default(), "[BASH]-[ERROR]-[npm]", record).unwrap();
      let text = advisory.to_string();
      assert!(text.contains("[BASH]-[ERROR]-[npm]"));
      assert!(text.contains(&format!("#{}", n)));
    }
  }

  #[test]
  fn health_alert_on_low_rate_with_enough_samples() {
    use Outcome::*;
    let record = skill_record(&[Positive, Negative, Negative]);
    let advisory = evaluate(&HealthPolicy::default(), "pdf", &record).unwrap();
    assert_eq!(
      advisory,
      Advisory::SkillHealth {
        skill: "pdf".into(),
        success_rate: 33.3
      }
    );
    assert!(advisory.to_string().contains("33.3% success rate"));
  }

  #[test]
  fn no_alert_below_min_samples() {
    use Outcome::*;
    let record = skill_record(&[Positive, Negative]);
    assert!((record.success_rate - 50.0).abs() < f64::EPSILON);
    assert_eq!(evaluate(&HealthPolicy::default(), "pdf", &record), None);
  }

  #[test]
  fn repeated_failures_when_rate_check_cannot_fire() {
    use Outcome::*;
    let record = skill_record(&[Negative, Negative]);
    assert_eq!(
      evaluate(&HealthPolicy::default(), "pdf", &record),
      Some(Advisory::RepeatedFailures {
        skill: "pdf".into(),
        failures: 2
      })
    );
  }

  #[test]
  fn repeated_failures_with_healthy_rate() {
    use Outcome::*;
    let mut outcomes = vec![Positive; 10];
    outcomes.extend([Negative, Negative]);
    let record = skill_record(&outcomes);
    assert!(record.success_rate >= 80.0);
    assert!(matches!(
      evaluate(&HealthPolicy::default(), "pdf", &record),
      Some(Advisory::RepeatedFailures { failures: 2, .. })
    ));
  }

  #[test]
  fn healthy_skill_is_silent() {
    use Outcome::*;
    let record = skill_record(&[Positive, Positive, Positive, Indeterminate]);
    assert_eq!(evaluate(&HealthPolicy::default(), "pdf", &record), None);
  }
}
