//! Gemini Live WebSocket message types.
//!
//! Only the client side of the protocol is typed. Server messages are forwarded
//! to SSE clients verbatim, so they stay as [`serde_json::Value`] and we only
//! peek at the few fields the session lifecycle depends on.

use serde::Serialize;
use serde_json::Value;

use crate::core::turns::TurnSequence;

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent to the Live API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// First message on every connection
    Setup(SetupMessage),
    /// Conversation content
    ClientContent(ClientContent),
}

/// Session setup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    /// Model resource name
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// Generation parameters for the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

/// Incremental conversation update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    /// Whether the server should start generating after these turns
    pub turn_complete: bool,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Text part of a turn.
#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

impl ClientMessage {
    /// Setup message for a model, requesting the given response modalities.
    pub fn setup(model: String, response_modalities: &[String]) -> Self {
        let generation_config = (!response_modalities.is_empty()).then(|| GenerationConfig {
            response_modalities: response_modalities.to_vec(),
        });
        ClientMessage::Setup(SetupMessage {
            model,
            generation_config,
        })
    }

    /// User turns, one content entry per turn, closing the client turn.
    pub fn user_turns(turns: &TurnSequence) -> Self {
        ClientMessage::ClientContent(ClientContent {
            turns: turns
                .iter()
                .map(|text| Content {
                    role: "user".to_string(),
                    parts: vec![Part { text: text.clone() }],
                })
                .collect(),
            turn_complete: true,
        })
    }
}

// =============================================================================
// Server Messages
// =============================================================================

/// Whether a server message acknowledges the setup message.
pub fn is_setup_complete(message: &Value) -> bool {
    message.get("setupComplete").is_some()
}

/// Whether a server message marks the end of the model turn.
pub fn is_turn_complete(message: &Value) -> bool {
    message
        .pointer("/serverContent/turnComplete")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
