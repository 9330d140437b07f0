//! Test doubles shared by the unit tests: a scripted chat model and state builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::StaticTokenVerifier;
use crate::config::AgentConfig;
use crate::openai::{ChatModel, ChatRequest, ModelError};
use crate::state::AppState;

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_UID: &str = "student-1";

pub enum Reply {
  Text(String),
  Empty,
  Fail,
}

/// Model double that records requests and answers from a fixed reply.
pub struct ScriptedModel {
  reply: Reply,
  pub seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
  pub fn new(reply: Reply) -> Arc<Self> {
    Arc::new(Self { reply, seen: Mutex::new(Vec::new()) })
  }
}

#[async_trait]
impl ChatModel for ScriptedModel {
  fn model_name(&self) -> &str {
    "scripted"
  }

  async fn complete(&self, req: &ChatRequest) -> Result<Option<String>, ModelError> {
    self.seen.lock().unwrap().push(req.clone());
    match &self.reply {
      Reply::Text(t) => Ok(Some(t.clone())),
      Reply::Empty => Ok(None),
      Reply::Fail => Err(ModelError::Timeout),
    }
  }
}

/// State with default config, the given model, and `TEST_TOKEN` mapped to `TEST_UID`.
pub fn state_with(model: Arc<ScriptedModel>) -> AppState {
  let tokens = HashMap::from([(TEST_TOKEN.to_string(), TEST_UID.to_string())]);
  AppState::from_parts(AgentConfig::default(), Some(model), Arc::new(StaticTokenVerifier::new(tokens)))
}
