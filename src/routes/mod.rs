//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - AI API under `/api/v1/ai/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/ai/solve", post(http::http_post_solve))
        .route("/api/v1/ai/practice-again", post(http::http_post_practice_again))
        .route("/api/v1/ai/next-level", post(http::http_post_next_level))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

/// Per-request span. Records the path only: the query string can carry the
/// WebSocket `?token=` credential.
fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::Mutex;

    use axum::http::StatusCode;
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    use crate::testing::{state_with, Reply, ScriptedModel, TEST_TOKEN};

    #[derive(Clone, Default)]
    struct LogBuf(Arc<Mutex<Vec<u8>>>);

    impl LogBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuf {
        type Writer = LogBuf;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    async fn logged_get(uri: &str) -> (StatusCode, String) {
        let logs = LogBuf::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = build_router(Arc::new(state_with(ScriptedModel::new(Reply::Empty))));
        let res = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        (res.status(), logs.contents())
    }

    #[tokio::test]
    async fn ws_token_is_not_logged() {
        let (status, logs) = logged_get("/ws?token=s3cret-tok").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(logs.contains("started processing request"));
        assert!(logs.contains("path=/ws"));
        assert!(!logs.contains("s3cret-tok"), "token leaked into logs:\n{logs}");
    }

    #[tokio::test]
    async fn accepted_ws_token_is_not_logged() {
        let (status, logs) = logged_get(&format!("/ws?token={TEST_TOKEN}")).await;
        assert_ne!(status, StatusCode::UNAUTHORIZED);
        assert!(logs.contains("path=/ws"));
        assert!(!logs.contains(TEST_TOKEN), "token leaked into logs:\n{logs}");
    }
}
