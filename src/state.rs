//! Application state: prompts, limits, the model client, the rate limiter and
//! the identity verifier.
//!
//! Everything that talks to the outside (model, verifier, window store) is held
//! behind a trait object so tests can build a state with doubles via `from_parts`.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::auth::{IdentityVerifier, StaticTokenVerifier};
use crate::config::{load_agent_config_from_env, AgentConfig, Limits, Prompts};
use crate::openai::{ChatModel, OpenAI};
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub prompts: Prompts,
    pub limits: Limits,
    pub model: Option<Arc<dyn ChatModel>>,
    pub rate_limiter: RateLimiter,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    /// Build state from env: load config, init the model client and the static verifier.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        // Load TOML config if provided (prompts + limits + tokens).
        let cfg = load_agent_config_from_env().unwrap_or_default();

        // Build optional model client (if API key present).
        let model = OpenAI::from_env(cfg.limits.model_timeout());
        if let Some(oa) = &model {
            info!(target: "tutorai_backend", base_url = %oa.base_url, model = %oa.model, timeout_secs = cfg.limits.model_timeout_secs, "Model client enabled.");
        } else {
            warn!(target: "tutorai_backend", "Model client disabled (OPENAI_API_KEY unset or client init failed). AI calls will fail with internal errors.");
        }

        if cfg.auth.tokens.is_empty() {
            warn!(target: "tutorai_backend", "No auth tokens configured; every AI call will be rejected as unauthenticated.");
        }

        let verifier = Arc::new(StaticTokenVerifier::new(cfg.auth.tokens.clone()));
        Self::from_parts(cfg, model.map(|m| Arc::new(m) as Arc<dyn ChatModel>), verifier)
    }

    /// Assemble state from explicit parts.
    pub fn from_parts(
        cfg: AgentConfig,
        model: Option<Arc<dyn ChatModel>>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let rate_limiter =
            RateLimiter::in_memory(cfg.limits.rate_limit_max, cfg.limits.rate_limit_window());
        info!(
            target: "tutorai_backend",
            max = cfg.limits.rate_limit_max,
            window_secs = cfg.limits.rate_limit_window_secs,
            prompt_max_chars = cfg.limits.prompt_max_chars,
            "Rate limiter ready"
        );
        Self {
            prompts: cfg.prompts,
            limits: cfg.limits,
            model,
            rate_limiter,
            verifier,
        }
    }

    /// Replace the rate limiter (e.g. with one backed by a shared store).
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
