//! Stable fingerprint computation for grouping error events into records.

use crate::config::ContextWindow;
use crate::types::Fingerprint;

/// Placeholder for an uppercase slot (source or signal) with nothing usable.
pub const UNKNOWN_TOKEN: &str = "UNKNOWN";
/// Placeholder for the context slot when the body has no usable token.
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Compute a fingerprint from the event source, the matched pattern names
/// (priority order) and the body text.
///
/// Key components: normalized source + first matched signal + the first
/// word/path token inside the leading `window.scan_chars` of the body.
/// Pure: no I/O, no clock, no randomness.
pub fn compute(source: &str, matched: &[&str], body: &str, window: &ContextWindow) -> Fingerprint {
  let source = normalize_token(source).unwrap_or_else(|| UNKNOWN_TOKEN.to_string());
  let signal = matched
    .first()
    .and_then(|name| normalize_token(name))
    .unwrap_or_else(|| UNKNOWN_TOKEN.to_string());
  let context = context_token(body, window).unwrap_or_else(|| UNKNOWN_CONTEXT.to_string());
  Fingerprint(format!("[{}]-[{}]-[{}]", source, signal, context))
}

/// Uppercase, then keep only `A-Z`, `0-9` and `_`. `None` if nothing is left.
pub fn normalize_token(raw: &str) -> Option<String> {
  let token: String = raw
    .to_uppercase()
    .chars()
    .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
    .collect();
  (!token.is_empty()).then_some(token)
}

/// First maximal run of word/path characters in the scan window, truncated.
pub fn context_token(body: &str, window: &ContextWindow) -> Option<String> {
  let end = body
    .char_indices()
    .nth(window.scan_chars)
    .map(|(i, _)| i)
    .unwrap_or(body.len());
  body[..end]
    .split(|c: char| !is_context_char(c))
    .find(|run| !run.is_empty())
    .map(|run| run.chars().take(window.max_chars).collect())
}

fn is_context_char(c: char) -> bool {
  c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '/')
}
