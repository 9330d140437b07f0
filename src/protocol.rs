//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::domain::Mode;
use crate::normalizer::Normalized;

/// Body of every AI call. `promptText` is kept as a raw JSON value so that a
/// missing or non-string prompt is reported as `invalid-argument`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiRequestIn {
    #[serde(rename = "promptText", default)]
    pub prompt_text: Option<Value>,
    #[serde(rename = "courseId", default)]
    pub course_id: Option<String>,
    #[serde(rename = "lessonId", default)]
    pub lesson_id: Option<String>,
}

/// `{ success: true, <resultKey>: <normalized>, timestamp }`.
#[derive(Debug, Clone)]
pub struct ModeResponse {
    pub mode: Mode,
    pub result: Normalized,
    pub timestamp: DateTime<Utc>,
}

impl Serialize for ModeResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("success", &true)?;
        map.serialize_entry(self.mode.result_key(), &self.result)?;
        map.serialize_entry(
            "timestamp",
            &self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;
        map.end()
    }
}

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Solve(AiRequestIn),
    PracticeAgain(AiRequestIn),
    NextLevel(AiRequestIn),
}

impl ClientWsMessage {
    /// Mode and payload for AI messages; None for control messages.
    pub fn into_mode_request(self) -> Option<(Mode, AiRequestIn)> {
        match self {
            ClientWsMessage::Ping => None,
            ClientWsMessage::Solve(req) => Some((Mode::Solve, req)),
            ClientWsMessage::PracticeAgain(req) => Some((Mode::PracticeAgain, req)),
            ClientWsMessage::NextLevel(req) => Some((Mode::NextLevel, req)),
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Result {
        mode: Mode,
        #[serde(flatten)]
        body: Value,
    },
    Error {
        #[serde(flatten)]
        body: Value,
    },
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub model_enabled: bool,
}
