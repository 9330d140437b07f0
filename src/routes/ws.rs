//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! The caller is authenticated once at upgrade time (bearer header or `?token=`);
//! every AI message then goes through the same rate limit and validation as HTTP.
//! Authentication runs before the upgrade is accepted, so a bad token gets a plain
//! 401 response instead of a socket.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  http::HeaderMap,
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, error, instrument, debug};

use crate::auth::{resolve_caller, Caller};
use crate::error::ApiError;
use crate::logic::run_mode;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
  #[serde(default)]
  pub token: Option<String>,
}

#[instrument(level = "info", skip(ws, state, headers, q))]
pub async fn ws_upgrade(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<WsAuthQuery>,
  ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
  let caller = match resolve_caller(&state, &headers, q.token.as_deref()).await {
    Ok(c) => c,
    Err(e) => return e.into_response(),
  };
  let ws = match ws {
    Ok(ws) => ws,
    Err(rejection) => return rejection.into_response(),
  };
  info!(target: "tutorai_backend", uid = %caller.uid, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, caller))
}

#[instrument(level = "info", skip(socket, state), fields(uid = %caller.uid))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, caller: Caller) {
  info!(target: "tutorai_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = handle_text_frame(&txt, &state, &caller).await;

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          error!(target: "tutorai_backend", error = %e, "WS serialization error");
          serde_json::json!({ "type": "error", "success": false, "error": { "code": "internal", "message": "serialization error" } }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "tutorai_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "tutorai_backend", "WebSocket disconnected");
}

/// Parse one text frame and dispatch it. Malformed frames become `invalid-argument`.
async fn handle_text_frame(txt: &str, state: &AppState, caller: &Caller) -> ServerWsMessage {
  match serde_json::from_str::<ClientWsMessage>(txt) {
    Ok(incoming) => {
      debug!(target: "tutorai_backend", text_len = txt.len(), "WS message received");
      handle_client_ws(incoming, state, caller).await
    }
    Err(e) => ServerWsMessage::Error {
      body: ApiError::InvalidArgument(format!("Invalid JSON: {}", e)).body(),
    },
  }
}

#[instrument(level = "info", skip_all)]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, caller: &Caller) -> ServerWsMessage {
  let Some((mode, req)) = msg.into_mode_request() else {
    return ServerWsMessage::Pong;
  };

  match run_mode(state, mode, caller, Ok(req)).await {
    Ok(resp) => match serde_json::to_value(&resp) {
      Ok(body) => {
        info!(target: "ai", %mode, fallback = resp.result.is_fallback(), "WS AI call served");
        ServerWsMessage::Result { mode, body }
      }
      Err(e) => {
        error!(target: "ai", %mode, error = %e, "Failed to encode AI result");
        ServerWsMessage::Error { body: ApiError::Internal.body() }
      }
    },
    Err(e) => ServerWsMessage::Error { body: e.body() },
  }
}
