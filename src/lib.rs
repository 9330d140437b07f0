//! TutorAI backend library: the AI solve / practice-again / next-level API.
//!
//! `main.rs` only wires telemetry, state and the listener; everything else lives
//! here so the router can be driven directly from integration tests.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod logic;
pub mod normalizer;
pub mod openai;
pub mod protocol;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;
