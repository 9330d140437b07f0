//! Loading agent configuration (prompts, limits, auth tokens) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `Limits` for expected schema. Every section
//! is optional; missing values fall back to the built-in defaults.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Mode, DEFAULT_PROMPT_MAX_CHARS};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub limits: Limits,
  #[serde(default)]
  pub auth: AuthConfig,
}

/// Bearer tokens accepted by the static verifier: token -> uid.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct AuthConfig {
  #[serde(default)]
  pub tokens: HashMap<String, String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  pub rate_limit_max: u32,
  pub rate_limit_window_secs: u64,
  pub prompt_max_chars: usize,
  pub model_timeout_secs: u64,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      rate_limit_max: 10,
      rate_limit_window_secs: 60,
      prompt_max_chars: DEFAULT_PROMPT_MAX_CHARS,
      model_timeout_secs: 30,
    }
  }
}

impl Limits {
  pub fn rate_limit_window(&self) -> Duration {
    Duration::from_secs(self.rate_limit_window_secs)
  }

  pub fn model_timeout(&self) -> Duration {
    Duration::from_secs(self.model_timeout_secs)
  }
}

/// System instructions and user templates, one pair per mode.
/// User templates have a single `{promptText}` substitution point.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub solve_system: String,
  pub solve_user_template: String,
  pub practice_system: String,
  pub practice_user_template: String,
  pub next_level_system: String,
  pub next_level_user_template: String,
}

const SOLUTION_SHAPE: &str = r#"{"subject": string, "level": "easy" | "medium" | "high", "answer": string, "workings": [{"part": string, "title": string, "body": string}]}"#;

impl Default for Prompts {
  fn default() -> Self {
    Self {
      solve_system: format!(
        "You are a patient tutor who solves school questions step by step. \
         Respond ONLY with strict JSON of the shape {SOLUTION_SHAPE}. \
         Classify the difficulty as easy, medium or high. \
         Write math inline with LaTeX. Do not wrap the JSON in markdown."
      ),
      solve_user_template: "Solve the following question and show your workings:\n{promptText}".into(),
      practice_system: format!(
        "You are a tutor who writes practice questions. Given a question, write ONE new question \
         that tests the same skill at the same difficulty, then solve it. \
         Respond ONLY with strict JSON: {{\"new_question\": string, \"solution\": {SOLUTION_SHAPE}}}. \
         Write math inline with LaTeX."
      ),
      practice_user_template: "Write a similar practice question to:\n{promptText}".into(),
      next_level_system: format!(
        "You are a tutor who helps students progress. Given a question, write ONE new question \
         on the same topic that is one difficulty level harder (easy -> medium -> high), then solve it. \
         Respond ONLY with strict JSON: {{\"next_level_question\": string, \"solution\": {SOLUTION_SHAPE}}}. \
         Write math inline with LaTeX."
      ),
      next_level_user_template: "Write the next-level question after:\n{promptText}".into(),
    }
  }
}

impl Prompts {
  /// (system, user template) for a mode.
  pub fn for_mode(&self, mode: Mode) -> (&str, &str) {
    match mode {
      Mode::Solve => (&self.solve_system, &self.solve_user_template),
      Mode::PracticeAgain => (&self.practice_system, &self.practice_user_template),
      Mode::NextLevel => (&self.next_level_system, &self.next_level_user_template),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "tutorai_backend", %path, tokens = cfg.auth.tokens.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tutorai_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tutorai_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_agent_config("").unwrap();
    assert_eq!(cfg.limits.rate_limit_max, 10);
    assert_eq!(cfg.limits.rate_limit_window(), Duration::from_secs(60));
    assert_eq!(cfg.limits.prompt_max_chars, 2000);
    assert_eq!(cfg.limits.model_timeout(), Duration::from_secs(30));
    assert!(cfg.auth.tokens.is_empty());
    assert!(cfg.prompts.solve_user_template.contains("{promptText}"));
  }

  #[test]
  fn partial_sections_merge_with_defaults() {
    let cfg = parse_agent_config(
      r#"
        [prompts]
        solve_system = "Only JSON."

        [limits]
        rate_limit_max = 3

        [auth.tokens]
        "tok-1" = "user-1"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.solve_system, "Only JSON.");
    assert!(cfg.prompts.practice_user_template.contains("{promptText}"));
    assert_eq!(cfg.limits.rate_limit_max, 3);
    assert_eq!(cfg.limits.rate_limit_window_secs, 60);
    assert_eq!(cfg.auth.tokens.get("tok-1").map(String::as_str), Some("user-1"));
  }

  #[test]
  fn every_mode_has_a_template_with_the_prompt_slot() {
    let prompts = Prompts::default();
    for mode in Mode::ALL {
      let (system, user) = prompts.for_mode(mode);
      assert!(!system.is_empty());
      assert!(user.contains("{promptText}"), "{mode} template lacks slot");
    }
  }

  #[test]
  fn malformed_config_is_an_error() {
    assert!(parse_agent_config("[limits]\nrate_limit_max = \"ten\"").is_err());
  }
}
