//! Core AI call path shared by both HTTP and WebSocket handlers.
//!
//! Order of checks for every mode:
//!   1) caller is authenticated (done by the `Caller` extractor / WS upgrade)
//!   2) rate limit for the caller's identity
//!   3) prompt validation
//!   4) one model call with the mode's fixed prompt, temperature and token budget
//!   5) normalization of the completion
//!
//! Steps 2-4 fail with a typed `ApiError`. Step 5 never fails.

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::domain::{Mode, PromptRequest};
use crate::error::ApiError;
use crate::normalizer::normalize_completion;
use crate::openai::ChatRequest;
use crate::protocol::{AiRequestIn, ModeResponse};
use crate::rate_limit::RateLimitDecision;
use crate::state::AppState;
use crate::util::{fill_template, trunc_for_log};

/// Run one AI mode for an authenticated caller.
///
/// `body` is `Err(reason)` when the transport could not decode the request;
/// that still counts against the caller's quota before being rejected.
#[instrument(
  level = "info",
  skip_all,
  fields(mode = %mode, uid = %caller.uid, request_id = %Uuid::new_v4())
)]
pub async fn run_mode(
  state: &AppState,
  mode: Mode,
  caller: &Caller,
  body: Result<AiRequestIn, String>,
) -> Result<ModeResponse, ApiError> {
  enforce_rate_limit(state, caller)?;

  let req = body.map_err(ApiError::InvalidArgument)?;
  let prompt = PromptRequest::from_value(req.prompt_text.as_ref(), state.limits.prompt_max_chars)?;
  info!(
    target: "ai",
    course_id = ?req.course_id,
    lesson_id = ?req.lesson_id,
    prompt_len = prompt.prompt_text.chars().count(),
    "Prompt accepted"
  );

  invoke_model(state, mode, &prompt).await
}

fn enforce_rate_limit(state: &AppState, caller: &Caller) -> Result<(), ApiError> {
  match state.rate_limiter.check(&caller.uid) {
    RateLimitDecision::Allowed { remaining, .. } => {
      info!(target: "ai", remaining, "Rate limit ok");
      Ok(())
    }
    RateLimitDecision::Limited { retry_after } => {
      warn!(target: "ai", ?retry_after, "Rate limit exceeded");
      Err(ApiError::ResourceExhausted { retry_after })
    }
  }
}

async fn invoke_model(state: &AppState, mode: Mode, prompt: &PromptRequest) -> Result<ModeResponse, ApiError> {
  let Some(model) = &state.model else {
    error!(target: "ai", "No model client configured (OPENAI_API_KEY unset)");
    return Err(ApiError::Internal);
  };

  let (system, template) = state.prompts.for_mode(mode);
  let request = ChatRequest {
    system: system.to_string(),
    user: fill_template(template, &[("promptText", &prompt.prompt_text)]),
    temperature: mode.temperature(),
    max_tokens: mode.max_tokens(),
  };

  let start = std::time::Instant::now();
  let content = match model.complete(&request).await {
    Ok(Some(text)) if !text.is_empty() => text,
    Ok(_) => {
      error!(target: "ai", model = model.model_name(), elapsed = ?start.elapsed(), "Model returned no content");
      return Err(ApiError::Internal);
    }
    Err(e) => {
      error!(target: "ai", model = model.model_name(), elapsed = ?start.elapsed(), error = %e, "Model call failed");
      return Err(ApiError::Internal);
    }
  };

  let result = normalize_completion(&content);
  if result.is_fallback() {
    warn!(
      target: "ai",
      completion_len = content.len(),
      preview = %trunc_for_log(&content, 120),
      "Completion was not JSON; returning raw content"
    );
  } else {
    info!(
      target: "ai",
      subject = result.str_field("subject").unwrap_or("-"),
      level = result.str_field("level").unwrap_or("-"),
      elapsed = ?start.elapsed(),
      "Completion normalized"
    );
  }

  Ok(ModeResponse { mode, result, timestamp: Utc::now() })
}
