//! Core types for the signal engine (JSON contracts + internal models).

use serde::Serialize;
use serde_json::{Map, Value};

/// Source label used when the event does not name one.
pub const UNKNOWN_SOURCE: &str = "unknown";

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// A decoded input field. `Invalid` means the key was present with the wrong type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
  Present(T),
  Absent,
  Invalid,
}

impl<T> Field<T> {
  pub fn present(&self) -> Option<&T> {
    match self {
      Self::Present(v) => Some(v),
      Self::Absent | Self::Invalid => None,
    }
  }

  pub fn is_present(&self) -> bool {
    matches!(self, Self::Present(_))
  }
}

impl<T> Default for Field<T> {
  fn default() -> Self {
    Self::Absent
  }
}

/// One hook invocation's input after total decoding.
///
/// `decode` never fails: anything unparseable becomes `ParsedInput::default()`,
/// which has every field `Absent` and is therefore a no-op for every hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInput {
  /// `tool_name`: the tool or skill runner that produced the event.
  pub source: Field<String>,
  /// `tool_output` (or `tool_response`): free text to classify.
  pub body: Field<String>,
  /// `tool_input.skill`: skill name for skill-runner events.
  pub skill: Field<String>,
}

impl ParsedInput {
  /// Decode one JSON document. Total: malformed input yields all-`Absent`.
  ///
  /// Only a JSON object is accepted; unknown keys are silently ignored.
  pub fn decode(raw: &str) -> Self {
    match serde_json::from_str::<Map<String, Value>>(raw) {
      Ok(object) => Self::from_object(object),
      Err(e) => {
        tracing::debug!(error = %e, "undecodable hook input, treating as empty");
        Self::default()
      }
    }
  }

  fn from_object(mut object: Map<String, Value>) -> Self {
    let body = object
      .remove("tool_output")
      .filter(|v| !v.is_null())
      .or_else(|| object.remove("tool_response"));
    let skill = match object.remove("tool_input") {
      None | Some(Value::Null) => Field::Absent,
      Some(Value::Object(mut input)) => string_field(input.remove("skill")),
      Some(_) => Field::Invalid,
    };
    Self {
      source: string_field(object.remove("tool_name")),
      body: body_field(body),
      skill,
    }
  }

  /// Source label, falling back to `unknown`.
  pub fn source_or_unknown(&self) -> &str {
    self
      .source
      .present()
      .map(String::as_str)
      .unwrap_or(UNKNOWN_SOURCE)
  }
}

fn string_field(value: Option<Value>) -> Field<String> {
  match value {
    None | Some(Value::Null) => Field::Absent,
    Some(Value::String(s)) => Field::Present(s),
    Some(_) => Field::Invalid,
  }
}

/// Bodies are coerced from any JSON value; empty text counts as absent.
fn body_field(value: Option<Value>) -> Field<String> {
  match value {
    None | Some(Value::Null) => Field::Absent,
    Some(Value::String(s)) if s.is_empty() => Field::Absent,
    Some(Value::String(s)) => Field::Present(s),
    Some(other) => Field::Present(other.to_string()),
  }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Identity key of a recurring error: `[SOURCE]-[SIGNAL]-[context]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

// ---------------------------------------------------------------------------
// Outcome (tri-state classification)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Positive,
  Negative,
  Indeterminate,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

/// The single JSON object written to stdout. Empty serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HookResponse {
  #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
  pub advisory: Option<String>,
}

impl HookResponse {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn with_advisory(advisory: impl Into<String>) -> Self {
    Self {
      advisory: Some(advisory.into()),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.advisory.is_none()
  }
}
