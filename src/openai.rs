//! Minimal chat-completion client (OpenAI-compatible) behind the `ChatModel` trait.
//!
//! We only call `chat/completions` with one system and one user message and
//! return the first choice's text. Calls are instrumented and log model name,
//! latency and token usage (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

/// One role-structured request to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
  pub system: String,
  pub user: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("model HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("model request timed out")]
  Timeout,
  #[error("model transport error: {0}")]
  Transport(String),
  #[error("model response decode error: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for ModelError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      ModelError::Timeout
    } else if e.is_decode() {
      ModelError::Decode(e.to_string())
    } else {
      ModelError::Transport(e.to_string())
    }
  }
}

/// Text-in/text-out chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
  /// Model identifier, for logs.
  fn model_name(&self) -> &str;

  /// Send the request and return the first choice's content, if any.
  async fn complete(&self, req: &ChatRequest) -> Result<Option<String>, ModelError>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(timeout: Duration) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = match reqwest::Client::builder().timeout(timeout).build() {
      Ok(c) => c,
      Err(e) => {
        error!(target: "tutorai_backend", error = %e, "Failed to build HTTP client for model");
        return None;
      }
    };

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }
}

#[async_trait]
impl ChatModel for OpenAI {
  fn model_name(&self) -> &str {
    &self.model
  }

  #[instrument(level = "info", skip(self, req), fields(model = %self.model, temperature = req.temperature, max_tokens = req.max_tokens, user_len = req.user.len()))]
  async fn complete(&self, req: &ChatRequest) -> Result<Option<String>, ModelError> {
    let url = format!("{}/chat/completions", self.base_url);
    let body = build_request_body(&self.model, req);

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "tutorai-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&body).send().await;

    let res = match res {
      Ok(r) => r,
      Err(e) => {
        let err = ModelError::from(e);
        error!(elapsed = ?start.elapsed(), error = %err, "Model request failed");
        return Err(err);
      }
    };

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(ModelError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Model usage");
    }
    info!(elapsed = ?start.elapsed(), choices = body.choices.len(), "Model response received");

    Ok(first_choice_text(body))
  }
}

fn build_request_body(model: &str, req: &ChatRequest) -> ChatCompletionRequest {
  ChatCompletionRequest {
    model: model.to_string(),
    messages: vec![
      ChatMessageReq { role: "system".into(), content: req.system.clone() },
      ChatMessageReq { role: "user".into(), content: req.user.clone() },
    ],
    temperature: req.temperature,
    max_tokens: req.max_tokens,
    stream: false,
  }
}

fn first_choice_text(body: ChatCompletionResponse) -> Option<String> {
  body.choices.into_iter().next().and_then(|c| c.message.content)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  max_tokens: u32,
  stream: bool,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { #[serde(default)] content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn request_body_is_non_streaming_with_two_messages() {
    let req = ChatRequest { system: "sys".into(), user: "usr".into(), temperature: 0.0, max_tokens: 1000 };
    let body = serde_json::to_value(build_request_body("m", &req)).unwrap();
    assert_eq!(
      body,
      json!({
        "model": "m",
        "messages": [
          { "role": "system", "content": "sys" },
          { "role": "user", "content": "usr" }
        ],
        "temperature": 0.0,
        "max_tokens": 1000,
        "stream": false
      })
    );
  }

  #[test]
  fn first_choice_text_is_taken() {
    let body: ChatCompletionResponse = serde_json::from_value(json!({
      "choices": [
        { "message": { "role": "assistant", "content": "first" } },
        { "message": { "role": "assistant", "content": "second" } }
      ]
    }))
    .unwrap();
    assert_eq!(first_choice_text(body).as_deref(), Some("first"));
  }

  #[test]
  fn missing_choices_or_content_is_none() {
    let empty: ChatCompletionResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
    assert_eq!(first_choice_text(empty), None);

    let null_content: ChatCompletionResponse =
      serde_json::from_value(json!({ "choices": [{ "message": { "content": null } }] })).unwrap();
    assert_eq!(first_choice_text(null_content), None);
  }

  #[test]
  fn openai_error_message_is_extracted() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>bad gateway</html>"), None);
  }
}
