//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs the caller and basic result info.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::auth::Caller;
use crate::domain::Mode;
use crate::error::ApiError;
use crate::logic::run_mode;
use crate::protocol::{AiRequestIn, HealthOut, ModeResponse};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, model_enabled: state.model.is_some() })
}

#[instrument(level = "info", skip(state, payload), fields(uid = %caller.uid))]
pub async fn http_post_solve(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  payload: Result<Json<AiRequestIn>, JsonRejection>,
) -> Result<Json<ModeResponse>, ApiError> {
  handle_mode(&state, Mode::Solve, &caller, payload).await
}

#[instrument(level = "info", skip(state, payload), fields(uid = %caller.uid))]
pub async fn http_post_practice_again(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  payload: Result<Json<AiRequestIn>, JsonRejection>,
) -> Result<Json<ModeResponse>, ApiError> {
  handle_mode(&state, Mode::PracticeAgain, &caller, payload).await
}

#[instrument(level = "info", skip(state, payload), fields(uid = %caller.uid))]
pub async fn http_post_next_level(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  payload: Result<Json<AiRequestIn>, JsonRejection>,
) -> Result<Json<ModeResponse>, ApiError> {
  handle_mode(&state, Mode::NextLevel, &caller, payload).await
}

async fn handle_mode(
  state: &AppState,
  mode: Mode,
  caller: &Caller,
  payload: Result<Json<AiRequestIn>, JsonRejection>,
) -> Result<Json<ModeResponse>, ApiError> {
  let body = payload.map(|Json(b)| b).map_err(|rej| rej.body_text());
  let resp = run_mode(state, mode, caller, body).await?;
  info!(target: "ai", %mode, uid = %caller.uid, fallback = resp.result.is_fallback(), "HTTP AI call served");
  Ok(Json(resp))
}
