//! Caller identity.
//!
//! Sign-in itself happens at the external auth provider. Requests carry the
//! resulting credential as `Authorization: Bearer <token>` (or `?token=` on the
//! WebSocket upgrade, since browsers cannot set headers there), and an
//! `IdentityVerifier` turns it into a `Caller`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
  extract::FromRequestParts,
  http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated request context.
/// Add this as a handler parameter to require authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  pub uid: String,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
  async fn verify(&self, token: &str) -> Option<Caller>;
}

/// Verifier backed by a fixed token -> uid table (from the `[auth]` config section).
#[derive(Debug, Default, Clone)]
pub struct StaticTokenVerifier {
  tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
  pub fn new(tokens: HashMap<String, String>) -> Self {
    Self { tokens }
  }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
  async fn verify(&self, token: &str) -> Option<Caller> {
    self.tokens.get(token).map(|uid| Caller { uid: uid.clone() })
  }
}

/// Token from `Authorization: Bearer <token>`; scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.split_once(' ')?;
  let token = token.trim();
  (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the caller from the header, falling back to an explicit token.
pub async fn resolve_caller(
  state: &AppState,
  headers: &HeaderMap,
  fallback_token: Option<&str>,
) -> Result<Caller, ApiError> {
  let token = bearer_token(headers)
    .or(fallback_token.filter(|t| !t.is_empty()))
    .ok_or(ApiError::Unauthenticated)?;
  match state.verifier.verify(token).await {
    Some(caller) => Ok(caller),
    None => {
      debug!(target: "auth", "Rejected unknown credential");
      Err(ApiError::Unauthenticated)
    }
  }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    resolve_caller(state, &parts.headers, None).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn bearer_token_parsing() {
    assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
    assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
    assert_eq!(bearer_token(&headers("Basic abc")), None);
    assert_eq!(bearer_token(&headers("Bearer ")), None);
    assert_eq!(bearer_token(&HeaderMap::new()), None);
  }

  #[tokio::test]
  async fn static_verifier_maps_tokens() {
    let v = StaticTokenVerifier::new(HashMap::from([("tok".to_string(), "alice".to_string())]));
    assert_eq!(v.verify("tok").await, Some(Caller { uid: "alice".into() }));
    assert_eq!(v.verify("nope").await, None);
  }
}
