//! Domain models: the three AI modes and the validated prompt request.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default upper bound on `promptText`, in characters.
pub const DEFAULT_PROMPT_MAX_CHARS: usize = 2000;

/// Which AI operation is being requested?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  /// Solve the user's question with structured workings (deterministic).
  Solve,
  /// Generate a fresh question of the same kind and solve it.
  PracticeAgain,
  /// Generate a harder follow-up question and solve it.
  NextLevel,
}

impl Mode {
  pub const ALL: [Mode; 3] = [Mode::Solve, Mode::PracticeAgain, Mode::NextLevel];

  pub fn temperature(self) -> f32 {
    match self {
      Mode::Solve => 0.0,
      Mode::PracticeAgain | Mode::NextLevel => 0.8,
    }
  }

  pub fn max_tokens(self) -> u32 {
    match self {
      Mode::Solve => 1000,
      Mode::PracticeAgain | Mode::NextLevel => 1200,
    }
  }

  /// Top-level key the normalized result is returned under.
  pub fn result_key(self) -> &'static str {
    match self {
      Mode::Solve => "solution",
      Mode::PracticeAgain => "practiceQuestion",
      Mode::NextLevel => "nextLevelQuestion",
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Mode::Solve => "solve",
      Mode::PracticeAgain => "practice-again",
      Mode::NextLevel => "next-level",
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("promptText is required")]
  Missing,
  #[error("promptText must be a string")]
  NotAString,
  #[error("promptText must not be empty")]
  Blank,
  #[error("promptText must be at most {max} characters (got {len})")]
  TooLong { len: usize, max: usize },
}

/// A prompt that passed validation. Holds the trimmed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
  pub prompt_text: String,
}

impl PromptRequest {
  /// Validate a raw JSON `promptText` value (absent, wrong type, blank, too long).
  pub fn from_value(value: Option<&Value>, max_chars: usize) -> Result<Self, ValidationError> {
    match value {
      None | Some(Value::Null) => Err(ValidationError::Missing),
      Some(Value::String(s)) => Self::new(s, max_chars),
      Some(_) => Err(ValidationError::NotAString),
    }
  }

  /// Validate raw prompt text. Length is counted in Unicode scalar values
  /// (`chars()`) before trimming, so an astral character such as an emoji counts
  /// once here where a UTF-16 `.length` would count it twice.
  pub fn new(text: &str, max_chars: usize) -> Result<Self, ValidationError> {
    let len = text.chars().count();
    if len > max_chars {
      return Err(ValidationError::TooLong { len, max: max_chars });
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
      return Err(ValidationError::Blank);
    }
    Ok(Self { prompt_text: trimmed.to_string() })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn mode_parameters() {
    assert_eq!(Mode::Solve.temperature(), 0.0);
    assert_eq!(Mode::Solve.max_tokens(), 1000);
    assert_eq!(Mode::PracticeAgain.temperature(), 0.8);
    assert_eq!(Mode::NextLevel.max_tokens(), 1200);
    assert_eq!(Mode::NextLevel.result_key(), "nextLevelQuestion");
    assert_eq!(Mode::PracticeAgain.to_string(), "practice-again");
  }

  #[test]
  fn empty_prompt_is_rejected() {
    assert_eq!(PromptRequest::new("", DEFAULT_PROMPT_MAX_CHARS), Err(ValidationError::Blank));
  }

  #[test]
  fn whitespace_prompt_is_rejected() {
    assert_eq!(PromptRequest::new(" \n\t ", DEFAULT_PROMPT_MAX_CHARS), Err(ValidationError::Blank));
  }

  #[test]
  fn over_length_prompt_is_rejected() {
    let text = "a".repeat(2001);
    assert_eq!(
      PromptRequest::new(&text, DEFAULT_PROMPT_MAX_CHARS),
      Err(ValidationError::TooLong { len: 2001, max: 2000 })
    );
  }

  #[test]
  fn max_length_prompt_is_accepted() {
    let text = "a".repeat(2000);
    let req = PromptRequest::new(&text, DEFAULT_PROMPT_MAX_CHARS).unwrap();
    assert_eq!(req.prompt_text.len(), 2000);
  }

  #[test]
  fn length_counts_characters_not_bytes() {
    let text = "π".repeat(2000);
    assert!(PromptRequest::new(&text, DEFAULT_PROMPT_MAX_CHARS).is_ok());
  }

  #[test]
  fn astral_characters_count_once() {
    let text = "\u{1F600}".repeat(2000);
    assert!(PromptRequest::new(&text, DEFAULT_PROMPT_MAX_CHARS).is_ok());
    let text = "\u{1F600}".repeat(2001);
    assert_eq!(
      PromptRequest::new(&text, DEFAULT_PROMPT_MAX_CHARS),
      Err(ValidationError::TooLong { len: 2001, max: 2000 })
    );
  }

  #[test]
  fn prompt_is_trimmed() {
    let req = PromptRequest::new("  solve 2x = 4 \n", DEFAULT_PROMPT_MAX_CHARS).unwrap();
    assert_eq!(req.prompt_text, "solve 2x = 4");
  }

  #[test]
  fn non_string_values_are_rejected() {
    let n = json!(42);
    assert_eq!(PromptRequest::from_value(Some(&n), 10), Err(ValidationError::NotAString));
    assert_eq!(PromptRequest::from_value(None, 10), Err(ValidationError::Missing));
    assert_eq!(PromptRequest::from_value(Some(&Value::Null), 10), Err(ValidationError::Missing));
  }
}
