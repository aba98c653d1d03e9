//! Base traits and types for live generation sessions.
//!
//! A live session is a bidirectional connection to a remote generation service:
//! turns go in, a sequence of server messages comes out. The remote side runs on
//! its own schedule, so instead of registering callbacks the session hands back
//! a channel of [`LiveEvent`]s that the consumer drains in order.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use zeroize::Zeroize;

use crate::core::turns::TurnSequence;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the live service.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the service failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for live operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Connection Target
// =============================================================================

/// Validated credential for the live service.
#[derive(Clone, PartialEq, Eq)]
pub enum LiveCredential {
    /// Developer API key
    ApiKey(String),
    /// Hosted identity (project + location, token acquired at connect time)
    Hosted { project: String, location: String },
}

impl LiveCredential {
    pub fn is_hosted(&self) -> bool {
        matches!(self, LiveCredential::Hosted { .. })
    }
}

impl fmt::Debug for LiveCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveCredential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            LiveCredential::Hosted { project, location } => f
                .debug_struct("Hosted")
                .field("project", project)
                .field("location", location)
                .finish(),
        }
    }
}

impl Drop for LiveCredential {
    fn drop(&mut self) {
        if let LiveCredential::ApiKey(key) = self {
            key.zeroize();
        }
    }
}

/// Everything a connector needs to open one session.
#[derive(Debug, Clone)]
pub struct LiveTarget {
    /// Credential to authenticate with
    pub credential: LiveCredential,
    /// Model name (bare, e.g. "gemini-2.0-flash-live-001", or a full resource name)
    pub model: String,
    /// API version override
    pub api_version: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

/// Event delivered by a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Server message (content fragment, turn-completion marker, metadata)
    Message(Value),
    /// Remote fault
    Error(String),
    /// Session closed; carries the close reason
    Close(String),
}

/// Health probe failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct ProbeFailure {
    /// Human readable failure
    pub error: String,
    /// Upstream response body, when one was received
    pub body: Option<String>,
}

impl ProbeFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

// =============================================================================
// Session & Connector Traits
// =============================================================================

/// Handle on an open live session.
///
/// Owned exclusively by one bridge for the lifetime of a request.
#[async_trait]
pub trait LiveSession: Send + Sync {
    /// Opaque session identifier.
    fn id(&self) -> &str;

    /// Submit user turns and mark the client turn complete.
    async fn send_turns(&self, turns: &TurnSequence) -> LiveResult<()>;

    /// Close the session and release the remote resource.
    ///
    /// Idempotent: closing a closed session is a no-op. Returns once the
    /// session's connection task has shut down, so any close event it produced
    /// is already queued on the event channel.
    async fn close(&self);

    /// Whether [`LiveSession::close`] has been called or the remote went away.
    fn is_closed(&self) -> bool;
}

/// An established session together with its event stream.
pub struct LiveConnection {
    pub session: Box<dyn LiveSession>,
    pub events: mpsc::Receiver<LiveEvent>,
}

/// Opens live sessions against a remote service.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a session. Resolves once the remote confirmed the connection.
    async fn connect(&self, target: &LiveTarget) -> LiveResult<LiveConnection>;

    /// Lightweight reachability check that never opens a session.
    async fn probe(&self, target: &LiveTarget) -> Result<(), ProbeFailure>;
}
