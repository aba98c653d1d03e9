//! Outbound SSE events and their frame encoding.
//!
//! Every event is written as a single frame:
//!
//! ```text
//! data: {"type":"message","payload":{...}}\n\n
//! ```
//!
//! The JSON is serialized compactly, so string contents containing newlines are
//! escaped and a frame never carries a blank line before its terminator.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Prefix of every frame.
pub const FRAME_PREFIX: &str = "data: ";

/// Frame terminator.
pub const FRAME_TERMINATOR: &str = "\n\n";

/// End reason written after the remote signalled turn completion.
pub const END_TURN_COMPLETE: &str = "turn_complete";

/// End reason written after the remote closed the session.
pub const END_CLOSED: &str = "closed";

/// End reason written after a remote fault.
pub const END_ERROR: &str = "error";

/// Events emitted to the SSE client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// Session established
    Open,
    /// Server message forwarded verbatim
    Message { payload: Value },
    /// Session closed by the remote
    Close { reason: String },
    /// Stream terminated by the gateway
    End {
        #[serde(
            default,
            deserialize_with = "present_value",
            skip_serializing_if = "Option::is_none"
        )]
        message: Option<Value>,
    },
    /// Remote fault
    Error { error: String },
}

impl OutboundEvent {
    /// `end` event carrying a textual reason.
    pub fn end(reason: impl Into<String>) -> Self {
        OutboundEvent::End {
            message: Some(Value::String(reason.into())),
        }
    }

    /// Wire name of the event (`"open"`, `"message"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::Open => "open",
            OutboundEvent::Message { .. } => "message",
            OutboundEvent::Close { .. } => "close",
            OutboundEvent::End { .. } => "end",
            OutboundEvent::Error { .. } => "error",
        }
    }
}

/// A present `message` is kept even when it is `null`; only a missing key is `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Encode an event as one SSE frame.
pub fn encode_frame(event: &OutboundEvent) -> Bytes {
    // Tagged enums of plain JSON values always serialize
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize outbound event: {}", e);
        r#"{"type":"error","error":"failed to serialize event"}"#.to_string()
    });

    let mut frame = String::with_capacity(FRAME_PREFIX.len() + json.len() + 2);
    frame.push_str(FRAME_PREFIX);
    frame.push_str(&json);
    frame.push_str(FRAME_TERMINATOR);
    Bytes::from(frame)
}

/// Parse a buffer of SSE frames back into events.
///
/// Splits on the blank-line terminator, strips the `data:` prefix and decodes
/// the JSON. Chunks that are not data frames or fail to decode are skipped.
pub fn parse_frames(buffer: &str) -> Vec<OutboundEvent> {
    buffer
        .split(FRAME_TERMINATOR)
        .filter_map(|chunk| {
            let data = chunk.trim_start_matches('\n').strip_prefix("data:")?;
            serde_json::from_str(data.trim_start()).ok()
        })
        .collect()
}
