//! Gemini Live API client implementation.
//!
//! This module provides the connector and session types that implement the
//! `LiveConnector`/`LiveSession` traits on top of the Gemini Live WebSocket API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages (text or binary frames)
//! - Handshake: `setup` -> `setupComplete`
//!
//! # Example
//!
//! ```rust,ignore
//! use live_stream_gateway::core::live::{GeminiLiveConfig, GeminiLiveConnector, LiveConnector};
//!
//! let connector = GeminiLiveConnector::new(GeminiLiveConfig::default());
//! let mut connection = connector.connect(&target).await?;
//! connection.session.send_turns(&turns).await?;
//! while let Some(event) = connection.events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::auth::{CredentialSource, GOOGLE_CLOUD_PLATFORM_SCOPE, GoogleAuthClient};
use super::config::{GeminiLiveConfig, model_resource};
use super::messages::{ClientMessage, is_setup_complete};
use crate::core::live::base::{
    LiveConnection, LiveConnector, LiveError, LiveEvent, LiveResult, LiveSession, LiveTarget,
    ProbeFailure,
};
use crate::core::turns::TurnSequence;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Channel capacity for messages sent to the service.
const WS_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events delivered to the session owner.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long `close` waits for the connection task to wind down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Close reason reported when the session was closed locally.
pub const LOCAL_CLOSE_REASON: &str = "session closed";

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
pub struct GeminiLiveConnector {
    config: GeminiLiveConfig,
    http: reqwest::Client,
    auth: GoogleAuthClient,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiLiveConfig) -> Self {
        let auth = GoogleAuthClient::new(
            CredentialSource::from_config(config.access_token.as_deref()),
            &[GOOGLE_CLOUD_PLATFORM_SCOPE],
        );
        Self {
            config,
            http: reqwest::Client::new(),
            auth,
        }
    }

    pub fn config(&self) -> &GeminiLiveConfig {
        &self.config
    }

    /// Build the upgrade request, attaching authorization headers in hosted mode.
    async fn build_request(&self, target: &LiveTarget) -> LiveResult<Request> {
        let url = self.config.ws_url(target)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;

        if target.credential.is_hosted() {
            let headers = self.auth.headers().await?;
            request.headers_mut().extend(headers);
        }

        Ok(request)
    }

    /// Upgrade, send `setup` and wait for `setupComplete`.
    async fn handshake(&self, target: &LiveTarget) -> LiveResult<(WsSink, WsSource)> {
        let request = self.build_request(target).await?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;

        let (mut sink, mut source) = ws_stream.split();

        let setup = ClientMessage::setup(model_resource(target), &self.config.response_modalities);
        send_json(&mut sink, &setup).await?;

        loop {
            let frame = match source.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(LiveError::ConnectionFailed(e.to_string())),
                None => {
                    return Err(LiveError::ConnectionFailed(
                        "Connection ended before setup completed".to_string(),
                    ));
                }
            };

            match frame {
                Message::Close(close) => {
                    return Err(LiveError::ConnectionFailed(format!(
                        "Connection closed before setup completed: {}",
                        close_reason(close.as_ref())
                    )));
                }
                Message::Ping(data) => {
                    sink.send(Message::Pong(data))
                        .await
                        .map_err(|e| LiveError::WebSocketError(e.to_string()))?;
                }
                other => {
                    if let Some(message) = decode_payload(&other) {
                        if is_setup_complete(&message) {
                            return Ok((sink, source));
                        }
                        tracing::debug!("Ignoring server message received before setup completed");
                    }
                }
            }
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self, target: &LiveTarget) -> LiveResult<LiveConnection> {
        let timeout = self.config.connect_timeout;
        let (sink, source) = tokio::time::timeout(timeout, self.handshake(target))
            .await
            .map_err(|_| {
                LiveError::Timeout(format!("Setup not completed within {}s", timeout.as_secs()))
            })??;

        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            session_id = %session_id,
            model = %target.model,
            hosted = target.credential.is_hosted(),
            "Gemini Live session established"
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(WS_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let task = ConnectionTask {
            sink,
            source,
            outgoing: outgoing_rx,
            events: EventSender::new(events_tx, shutdown.clone()),
            shutdown: shutdown.clone(),
            finished: finished.clone(),
            session_id: session_id.clone(),
        };
        let handle = tokio::spawn(task.run());

        let session = GeminiLiveSession {
            id: session_id,
            outgoing: outgoing_tx,
            shutdown,
            close_requested: AtomicBool::new(false),
            finished,
            task: Mutex::new(Some(handle)),
        };

        Ok(LiveConnection {
            session: Box::new(session),
            events: events_rx,
        })
    }

    async fn probe(&self, target: &LiveTarget) -> Result<(), ProbeFailure> {
        let url = self
            .config
            .probe_url(target)
            .map_err(|e| ProbeFailure::new(e.to_string()))?;

        let mut request = self.http.get(url).timeout(self.config.connect_timeout);
        if target.credential.is_hosted() {
            let headers = self
                .auth
                .headers()
                .await
                .map_err(|e| ProbeFailure::new(e.to_string()))?;
            request = request.headers(headers);
        }

        let response = request.send().await.map_err(|e| {
            ProbeFailure::new(format!("Failed to reach live service: {}", e.without_url()))
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = %status, "Live service probe succeeded");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "Live service probe failed");
        let failure = ProbeFailure::new(format!("Live service responded with status {status}"));
        Err(if body.is_empty() {
            failure
        } else {
            failure.with_body(body)
        })
    }
}

// =============================================================================
// Session
// =============================================================================

/// Handle on one Gemini Live session.
///
/// The WebSocket itself is owned by a spawned connection task; this handle only
/// talks to it through channels and the shutdown token.
pub struct GeminiLiveSession {
    id: String,
    outgoing: mpsc::Sender<ClientMessage>,
    shutdown: CancellationToken,
    close_requested: AtomicBool,
    /// Set by the connection task once it has delivered its final close event
    finished: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_turns(&self, turns: &TurnSequence) -> LiveResult<()> {
        if self.is_closed() {
            return Err(LiveError::NotConnected);
        }

        tracing::debug!(session_id = %self.id, turns = turns.len(), "Submitting turns");
        self.outgoing
            .send(ClientMessage::user_turns(turns))
            .await
            .map_err(|_| LiveError::NotConnected)
    }

    async fn close(&self) {
        if self.close_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown.cancel();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(CLOSE_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(session_id = %self.id, "Connection task failed: {}", e);
                }
                Err(_) => {
                    tracing::warn!(
                        session_id = %self.id,
                        "Connection task did not shut down within {}s",
                        CLOSE_TIMEOUT.as_secs()
                    );
                }
            }
        }

        tracing::info!(session_id = %self.id, "Gemini Live session closed");
    }

    fn is_closed(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst) || self.finished.load(Ordering::SeqCst)
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// Connection Task
// =============================================================================

struct ConnectionTask {
    sink: WsSink,
    source: WsSource,
    outgoing: mpsc::Receiver<ClientMessage>,
    events: EventSender,
    shutdown: CancellationToken,
    finished: Arc<AtomicBool>,
    session_id: String,
}

impl ConnectionTask {
    async fn run(mut self) {
        let reason = self.pump().await;

        if !self.events.deliver(LiveEvent::Close(reason)).await {
            tracing::debug!(session_id = %self.session_id, "Event channel unavailable, close not reported");
        }

        self.finished.store(true, Ordering::SeqCst);
        tracing::debug!(session_id = %self.session_id, "Connection task finished");
    }

    /// Move messages in both directions until the connection ends.
    /// Returns the close reason.
    async fn pump(&mut self) -> String {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    if let Err(e) = self.sink.send(Message::Close(None)).await {
                        tracing::debug!(session_id = %self.session_id, "Failed to send close frame: {}", e);
                    }
                    return LOCAL_CLOSE_REASON.to_string();
                }

                Some(message) = self.outgoing.recv() => {
                    if let Err(e) = send_json(&mut self.sink, &message).await {
                        tracing::error!(session_id = %self.session_id, "Failed to send message: {}", e);
                        let reason = e.to_string();
                        self.events.deliver(LiveEvent::Error(reason.clone())).await;
                        return reason;
                    }
                }

                incoming = self.source.next() => match incoming {
                    Some(Ok(Message::Close(frame))) => {
                        let reason = close_reason(frame.as_ref());
                        tracing::info!(session_id = %self.session_id, reason = %reason, "WebSocket closed by server");
                        return reason;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = self.sink.send(Message::Pong(data)).await {
                            tracing::error!(session_id = %self.session_id, "Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(frame)) => {
                        if let Some(payload) = decode_payload(&frame)
                            && !self.events.deliver(LiveEvent::Message(payload)).await
                        {
                            return LOCAL_CLOSE_REASON.to_string();
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(session_id = %self.session_id, "WebSocket error: {}", e);
                        let reason = format!("WebSocket error: {e}");
                        self.events.deliver(LiveEvent::Error(reason.clone())).await;
                        return reason;
                    }
                    None => {
                        tracing::info!(session_id = %self.session_id, "WebSocket stream ended");
                        return String::new();
                    }
                }
            }
        }
    }

}

/// Event channel writer that stops waiting once the session is shut down.
struct EventSender {
    events: mpsc::Sender<LiveEvent>,
    shutdown: CancellationToken,
}

impl EventSender {
    fn new(events: mpsc::Sender<LiveEvent>, shutdown: CancellationToken) -> Self {
        Self { events, shutdown }
    }

    /// Deliver an event, waiting for channel capacity.
    ///
    /// Free capacity is always used, even after shutdown, so an event queued
    /// behind an error is not lost to a concurrent close. Returns false when the
    /// owner is gone, or when shutdown was requested and the channel is full.
    async fn deliver(&self, event: LiveEvent) -> bool {
        let permit = tokio::select! {
            biased;
            permit = self.events.reserve() => permit.ok(),
            _ = self.shutdown.cancelled() => None,
        };

        match permit {
            Some(permit) => {
                permit.send(event);
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn send_json(sink: &mut WsSink, message: &ClientMessage) -> LiveResult<()> {
    let json = serde_json::to_string(message)
        .map_err(|e| LiveError::SerializationError(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| LiveError::WebSocketError(e.to_string()))
}

/// Parse the JSON carried by a text or binary frame.
fn decode_payload(frame: &Message) -> Option<Value> {
    let parsed = match frame {
        Message::Text(text) => serde_json::from_str(text.as_str()),
        Message::Binary(data) => serde_json::from_slice(data),
        _ => return None,
    };

    match parsed {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Failed to parse server message: {}", e);
            None
        }
    }
}

fn close_reason(frame: Option<&CloseFrame>) -> String {
    frame
        .map(|f| f.reason.as_str().to_string())
        .unwrap_or_default()
}
