//! Tri-state outcome voting and failure-snippet extraction.

use crate::patterns::PatternSet;
use crate::types::Outcome;

/// Characters kept before a failure indicator in a snippet.
pub const SNIPPET_BEFORE: usize = 20;
/// Characters kept after a failure indicator in a snippet.
pub const SNIPPET_AFTER: usize = 30;

/// Vote an outcome from independent negative/positive indicator counts.
///
/// Negative wins only with a strict majority; any positive evidence
/// otherwise wins, so an equal non-zero tie is `Positive`.
pub fn classify(text: &str, negative: &PatternSet, positive: &PatternSet) -> Outcome {
  vote(negative.count(text), positive.count(text))
}

pub fn vote(negative: usize, positive: usize) -> Outcome {
  if negative > positive {
    Outcome::Negative
  } else if positive > 0 {
    Outcome::Positive
  } else {
    Outcome::Indeterminate
  }
}

/// Text around the highest-priority negative indicator, trimmed.
pub fn failure_snippet(text: &str, negative: &PatternSet) -> Option<String> {
  let (_, m) = negative.first_match(text)?;
  let start = text[..m.start()]
    .char_indices()
    .rev()
    .nth(SNIPPET_BEFORE - 1)
    .map(|(i, _)| i)
    .unwrap_or(0);
  let end = text[m.end()..]
    .char_indices()
    .nth(SNIPPET_AFTER)
    .map(|(i, _)| m.end() + i)
    .unwrap_or(text.len());
  Some(text[start..end].trim().to_string())
}
