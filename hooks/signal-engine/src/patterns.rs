//! Ordered, named signal patterns and the built-in pattern sets.

use regex::{Match, Regex, RegexBuilder};

use crate::error::EngineError;

/// Recurring-error indicators, highest priority first.
pub const ERROR_INDICATORS: &[(&str, &str)] = &[
  ("error", r"\berror\b"),
  ("failed", r"\bfailed?\b"),
  ("denied", r"\bdenied\b"),
  ("not_found", r"\bnot\s+found\b"),
  ("timeout", r"\btimeout\b"),
  ("exception", r"\bexception\b"),
  ("http_status", r"\b[45]\d{2}\b"),
  ("permission", r"\bpermission\b"),
  ("refused", r"\brefused\b"),
  ("rejected", r"\brejected\b"),
  ("unable_to", r"\bunable\s+to\b"),
  ("cannot", r"\bcannot\b"),
  ("no_such", r"\bno\s+such\b"),
];

/// Negative outcome indicators for skill runs.
pub const FAILURE_INDICATORS: &[(&str, &str)] = &[
  ("failed", r"\bfailed\b"),
  ("error", r"\berror\b"),
  ("unable_to", r"\bunable\s+to\b"),
  ("cannot", r"\bcannot\b"),
  ("exception", r"\bexception\b"),
  ("rejected", r"\brejected\b"),
];

/// Positive outcome indicators for skill runs.
pub const SUCCESS_INDICATORS: &[(&str, &str)] = &[
  ("success", r"\bsuccess(?:fully)?\b"),
  ("completed", r"\bcomplete[d]?\b"),
  ("done", r"\bdone\b"),
  ("finished", r"\bfinished\b"),
  ("created", r"\bcreated\b"),
  ("updated", r"\bupdated\b"),
];

/// One named matcher. Always case-insensitive.
#[derive(Debug, Clone)]
pub struct SignalPattern {
  pub name: String,
  matcher: Regex,
}

impl SignalPattern {
  pub fn new(name: &str, source: &str) -> Result<Self, EngineError> {
    let matcher = RegexBuilder::new(source)
      .case_insensitive(true)
      .build()
      .map_err(|e| EngineError::pattern(name, e))?;
    Ok(Self {
      name: name.to_string(),
      matcher,
    })
  }

  pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
    self.matcher.find(text)
  }

  pub fn is_match(&self, text: &str) -> bool {
    self.matcher.is_match(text)
  }
}

/// A named, ordered group of patterns. Order is priority.
#[derive(Debug, Clone)]
pub struct PatternSet {
  pub name: String,
  patterns: Vec<SignalPattern>,
}

impl PatternSet {
  pub fn compile(name: &str, defs: &[(&str, &str)]) -> Result<Self, EngineError> {
    let patterns = defs
      .iter()
      .map(|(n, src)| SignalPattern::new(n, src))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self {
      name: name.to_string(),
      patterns,
    })
  }

  /// Names of every pattern found in `text`, in declaration order.
  pub fn matches(&self, text: &str) -> Vec<&str> {
    self
      .patterns
      .iter()
      .filter(|p| p.is_match(text))
      .map(|p| p.name.as_str())
      .collect()
  }

  /// Number of distinct patterns found in `text`.
  pub fn count(&self, text: &str) -> usize {
    self.patterns.iter().filter(|p| p.is_match(text)).count()
  }

  /// First pattern (by priority) found in `text`, with its match location.
  pub fn first_match<'t>(&self, text: &'t str) -> Option<(&SignalPattern, Match<'t>)> {
    self
      .patterns
      .iter()
      .find_map(|p| p.find(text).map(|m| (p, m)))
  }

  pub fn len(&self) -> usize {
    self.patterns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.patterns.is_empty()
  }
}

/// The three pattern sets the engine runs with.
#[derive(Debug, Clone)]
pub struct Signals {
  pub errors: PatternSet,
  pub failures: PatternSet,
  pub successes: PatternSet,
}

impl Signals {
  pub fn builtin() -> Result<Self, EngineError> {
    Ok(Self {
      errors: PatternSet::compile("error indicators", ERROR_INDICATORS)?,
      failures: PatternSet::compile("failure indicators", FAILURE_INDICATORS)?,
      successes: PatternSet::compile("success indicators", SUCCESS_INDICATORS)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn errors() -> PatternSet {
    PatternSet::compile("errors", ERROR_INDICATORS).unwrap()
  }

  #[test]
  fn builtin_sets_compile() {
    let signals = Signals::builtin().unwrap();
    assert_eq!(signals.errors.name, "error indicators");
    assert_eq!(signals.errors.len(), 13);
    assert_eq!(signals.failures.len(), 6);
    assert_eq!(signals.successes.len(), 6);
  }

  #[test]
  fn matches_follow_declaration_order_not_text_order() {
    // "permission" appears first in the text but "denied" has higher priority.
    let set = errors();
    let found = set.matches("permission denied: /etc/shadow");
    assert_eq!(found, vec!["denied", "permission"]);
  }

  #[test]
  fn matching_is_case_insensitive() {
    assert_eq!(errors().matches("FATAL ERROR"), vec!["error"]);
    assert_eq!(errors().matches("File Not   Found"), vec!["not_found"]);
  }

  #[test]
  fn no_match_is_empty_not_error() {
    assert!(errors().matches("all good here").is_empty());
    assert_eq!(errors().count("all good here"), 0);
  }

  #[test]
  fn word_boundaries_are_respected() {
    // "errors" and "terror" are not the word "error".
    assert!(errors().matches("terrorist errors").is_empty());
    assert_eq!(errors().matches("request returned 404"), vec!["http_status"]);
    assert!(errors().matches("port 40443").is_empty());
  }

  #[test]
  fn first_match_reports_location() {
    let set = PatternSet::compile("failures", FAILURE_INDICATORS).unwrap();
    let text = "build ok, then it failed hard";
    let (pattern, m) = set.first_match(text).unwrap();
    assert_eq!(pattern.name, "failed");
    assert_eq!(&text[m.start()..m.end()], "failed");
  }

  #[test]
  fn invalid_pattern_is_reported_with_name() {
    let err = PatternSet::compile("bad", &[("broken", r"(unclosed")]).unwrap_err();
    assert!(err.to_string().contains("broken"));
  }
}
