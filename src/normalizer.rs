//! Tolerant extraction of a JSON payload from a raw model completion.
//!
//! Models are asked for strict JSON but frequently answer with:
//!   - the JSON itself,
//!   - the JSON inside a ```json fenced block (sometimes with prose around it),
//!   - the JSON embedded as a string in a `{"content": "..."}` envelope,
//!   - LaTeX inline delimiters `\(` `\)` that are not valid JSON escapes,
//!   - or plain prose.
//!
//! `normalize_completion` runs a fixed sequence of speculative steps. A step that
//! does not apply leaves the working text as it was, and the next step runs anyway.
//! Only the final parse decides between a structured value and the fallback
//! `{ "content": <raw> }`. Nothing here returns an error or panics on input.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"```(?:[jJ][sS][oO][nN])?\s*([\s\S]*?)\s*```").expect("fenced block regex is valid")
});

// `\(` `\)` with one or two backslashes.
static LATEX_PAREN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\\{1,2}[()]").expect("latex delimiter regex is valid"));

/// Result of normalizing one completion.
///
/// Serializes transparently: a structured value as itself, the fallback as
/// `{"content": "<raw completion>"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Normalized {
  Structured(Value),
  Fallback { content: String },
}

impl Normalized {
  pub fn is_fallback(&self) -> bool {
    matches!(self, Normalized::Fallback { .. })
  }

  /// Top-level string field of a structured object (e.g. `subject`, `level`).
  /// `level` is returned exactly as the model produced it.
  pub fn str_field(&self, key: &str) -> Option<&str> {
    match self {
      Normalized::Structured(v) => v.get(key).and_then(Value::as_str),
      Normalized::Fallback { .. } => None,
    }
  }

  pub fn into_value(self) -> Value {
    match self {
      Normalized::Structured(v) => v,
      Normalized::Fallback { content } => serde_json::json!({ "content": content }),
    }
  }
}

/// Turn a raw completion into a structured value, or the `{content}` fallback.
pub fn normalize_completion(raw: &str) -> Normalized {
  let unwrapped = unwrap_envelope(raw);
  let working: &str = unwrapped.as_deref().unwrap_or(raw);
  let working = strip_fence(working).unwrap_or(working);
  let working = normalize_latex(working);

  match serde_json::from_str::<Value>(working.trim()) {
    Ok(v) => Normalized::Structured(v),
    Err(_) => Normalized::Fallback { content: raw.to_string() },
  }
}

/// Stage 1: `{"content": "<payload>"}` → `<payload>`.
/// None when the text is not JSON or has no string `content`.
fn unwrap_envelope(raw: &str) -> Option<String> {
  let v: Value = serde_json::from_str(raw).ok()?;
  v.get("content").and_then(Value::as_str).map(str::to_owned)
}

/// Stage 2: interior of the first fenced code block, trimmed.
fn strip_fence(text: &str) -> Option<&str> {
  FENCED_BLOCK
    .captures(text)
    .and_then(|caps| caps.get(1))
    .map(|m| m.as_str().trim())
}

/// Stage 3: LaTeX inline-math delimiters become a backtick.
fn normalize_latex(text: &str) -> Cow<'_, str> {
  LATEX_PAREN.replace_all(text, "`")
}
