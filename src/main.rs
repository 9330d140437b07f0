//! TutorAI · AI Tutoring Backend
//!
//! - Axum HTTP + WebSocket API for solve / practice-again / next-level
//! - OpenAI-compatible model integration (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   OPENAI_API_KEY     : enables the model client if present
//!   OPENAI_BASE_URL    : default "https://api.openai.com/v1"
//!   OPENAI_MODEL       : default "gpt-4o-mini"
//!   AGENT_CONFIG_PATH  : path to TOML config (prompts + limits + auth tokens)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{debug, info};

use tutorai_backend::routes::build_router;
use tutorai_backend::state::AppState;
use tutorai_backend::telemetry;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (prompts, model client, rate limiter, verifier).
  let state = Arc::new(AppState::new());

  // Expired rate-limit windows are dropped in the background.
  let limiter = state.rate_limiter.clone();
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(PURGE_INTERVAL);
    loop {
      tick.tick().await;
      let purged = limiter.purge_expired();
      if purged > 0 {
        debug!(target: "rate_limit", purged, tracked = limiter.tracked_identities(), "Purged expired windows");
      }
    }
  });

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "tutorai_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "tutorai_backend", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
