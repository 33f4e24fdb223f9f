//! Shared helpers for the WebSocket client.
//!
//! This module is runtime-agnostic (no tokio) so it can be used by the
//! sans-IO session as well as the socket driver.

use secret_hitler_protocol::ServerMessage;

// Reconnection constants
pub const INITIAL_RETRY_DELAY_MS: u64 = 250;
pub const MAX_RETRY_DELAY_MS: u64 = 4_000;
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Why an inbound frame was dropped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("malformed `{kind}` frame: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded frame together with its raw `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub kind: String,
    pub message: ServerMessage,
}

pub fn parse_server_message(text: &str) -> Result<InboundFrame, FrameError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;

    let kind = value
        .as_object()
        .ok_or(FrameError::NotAnObject)?
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(FrameError::MissingType)?
        .to_string();

    let message = serde_json::from_value(value).map_err(|source| FrameError::Malformed {
        kind: kind.clone(),
        source,
    })?;

    Ok(InboundFrame { kind, message })
}
