//! Typed failures returned to callers, and their HTTP mapping.
//!
//! Body shape: `{"success": false, "error": {"code": "<code>", "message": "<text>"}}`.
//! Internal causes are logged where they happen and never put in the body.

use std::time::Duration;

use axum::{
  http::{header::RETRY_AFTER, HeaderValue, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthenticated,
  #[error("too many requests, retry in {}s", .retry_after.as_secs().max(1))]
  ResourceExhausted { retry_after: Duration },
  #[error("{0}")]
  InvalidArgument(String),
  #[error("internal error, please try again later")]
  Internal,
}

impl ApiError {
  pub fn code(&self) -> &'static str {
    match self {
      ApiError::Unauthenticated => "unauthenticated",
      ApiError::ResourceExhausted { .. } => "resource-exhausted",
      ApiError::InvalidArgument(_) => "invalid-argument",
      ApiError::Internal => "internal",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
      ApiError::ResourceExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
      ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
      ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// JSON body, also used for WebSocket error frames.
  pub fn body(&self) -> serde_json::Value {
    json!({
      "success": false,
      "error": { "code": self.code(), "message": self.to_string() }
    })
  }
}

impl From<ValidationError> for ApiError {
  fn from(e: ValidationError) -> Self {
    ApiError::InvalidArgument(e.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let mut res = (self.status(), Json(self.body())).into_response();
    if let ApiError::ResourceExhausted { retry_after } = &self {
      let secs = retry_after.as_secs().max(1);
      res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    res
  }
}
