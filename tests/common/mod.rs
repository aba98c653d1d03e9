//! Shared helpers for integration tests: a scripted connector for the HTTP
//! layer and an in-process Live API server for the Gemini client.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{Router, body::Body, http::Response};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use live_stream_gateway::config::{AllowedOrigins, CorsConfig, LiveSettings, LiveSettingsSource};
use live_stream_gateway::core::live::{
    LiveConnection, LiveConnector, LiveError, LiveEvent, LiveResult, LiveSession, LiveTarget,
    ProbeFailure,
};
use live_stream_gateway::core::{OutboundEvent, TurnSequence, parse_frames};
use live_stream_gateway::{ServerConfig, routes, state::AppState};

// =============================================================================
// Scripted connector
// =============================================================================

/// What the scripted connector observed.
#[derive(Default)]
pub struct Observed {
    pub connects: AtomicUsize,
    pub probes: AtomicUsize,
    pub closes: AtomicUsize,
    pub turns: Mutex<Vec<Vec<String>>>,
    pub models: Mutex<Vec<String>>,
}

/// Connector that replays a fixed list of events for every session.
pub struct ScriptedConnector {
    script: Vec<LiveEvent>,
    connect_error: Option<String>,
    probe_result: Result<(), ProbeFailure>,
    pub observed: Arc<Observed>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<LiveEvent>) -> Self {
        Self {
            script,
            connect_error: None,
            probe_result: Ok(()),
            observed: Arc::new(Observed::default()),
        }
    }

    pub fn failing(message: &str) -> Self {
        let mut connector = Self::new(Vec::new());
        connector.connect_error = Some(message.to_string());
        connector
    }

    pub fn with_probe_result(mut self, result: Result<(), ProbeFailure>) -> Self {
        self.probe_result = result;
        self
    }
}

struct ScriptedSession {
    observed: Arc<Observed>,
    // Holding the sender keeps the event channel open until close
    keep_open: Mutex<Option<mpsc::Sender<LiveEvent>>>,
}

#[async_trait]
impl LiveSession for ScriptedSession {
    fn id(&self) -> &str {
        "scripted-session"
    }

    async fn send_turns(&self, turns: &TurnSequence) -> LiveResult<()> {
        self.observed
            .turns
            .lock()
            .unwrap()
            .push(turns.as_slice().to_vec());
        Ok(())
    }

    async fn close(&self) {
        if self.keep_open.lock().unwrap().take().is_some() {
            self.observed.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.keep_open.lock().unwrap().is_none()
    }
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn connect(&self, target: &LiveTarget) -> LiveResult<LiveConnection> {
        self.observed.connects.fetch_add(1, Ordering::SeqCst);
        self.observed
            .models
            .lock()
            .unwrap()
            .push(target.model.clone());

        if let Some(message) = &self.connect_error {
            return Err(LiveError::ConnectionFailed(message.clone()));
        }

        let (tx, rx) = mpsc::channel(self.script.len().max(1));
        for event in &self.script {
            tx.try_send(event.clone()).unwrap();
        }

        Ok(LiveConnection {
            session: Box::new(ScriptedSession {
                observed: self.observed.clone(),
                keep_open: Mutex::new(Some(tx)),
            }),
            events: rx,
        })
    }

    async fn probe(&self, _target: &LiveTarget) -> Result<(), ProbeFailure> {
        self.observed.probes.fetch_add(1, Ordering::SeqCst);
        self.probe_result.clone()
    }
}

/// Script of a model reply that completes the turn.
pub fn completed_turn_script() -> Vec<LiveEvent> {
    vec![
        LiveEvent::Message(json!({
            "serverContent": {"modelTurn": {"parts": [{"text": "Hi there"}]}}
        })),
        LiveEvent::Message(json!({"serverContent": {"turnComplete": true}})),
    ]
}

// =============================================================================
// Configuration and app
// =============================================================================

/// Config with fixed live settings so tests never depend on the environment.
pub fn test_config(settings: LiveSettings) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.live = LiveSettingsSource::Fixed(settings);
    config
}

pub fn with_allow_list(mut config: ServerConfig, origins: &str, credentials: bool) -> ServerConfig {
    config.cors = CorsConfig {
        allowed_origins: AllowedOrigins::parse(origins),
        allow_credentials: credentials,
    };
    config
}

pub fn app_with(config: ServerConfig, connector: Arc<dyn LiveConnector>) -> Router {
    routes::create_app(AppState::with_connector(config, connector))
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_events(response: Response<Body>) -> Vec<OutboundEvent> {
    let bytes = body_bytes(response).await;
    parse_frames(std::str::from_utf8(&bytes).unwrap())
}

pub fn kinds(events: &[OutboundEvent]) -> Vec<&'static str> {
    events.iter().map(OutboundEvent::kind).collect()
}

// =============================================================================
// In-process Live API server
// =============================================================================

/// How the mock Live API server behaves on each connection.
#[derive(Clone, Debug)]
pub enum ServerBehavior {
    /// Acknowledge setup, wait for content, send `replies`, then wait for close
    Converse { replies: Vec<Value>, binary: bool },
    /// Answer the setup message with a close frame
    CloseBeforeSetup(String),
    /// Read setup and never answer
    Silent,
    /// Acknowledge setup, then close with a reason
    CloseAfterSetup(String),
}

/// Start a mock server. Returns its `ws://` base URL and the client messages it received.
pub async fn spawn_live_server(behavior: ServerBehavior) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle_connection(stream, behavior.clone(), tx.clone()));
        }
    });

    (format!("ws://{addr}"), rx)
}

async fn handle_connection(
    stream: TcpStream,
    behavior: ServerBehavior,
    received: mpsc::UnboundedSender<Value>,
) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    let Some(setup) = next_json(&mut read).await else {
        return;
    };
    let _ = received.send(setup);

    match behavior {
        ServerBehavior::CloseBeforeSetup(reason) => {
            let _ = write.send(close_frame(reason)).await;
        }
        ServerBehavior::Silent => while read.next().await.is_some() {},
        ServerBehavior::CloseAfterSetup(reason) => {
            let _ = write.send(setup_complete(false)).await;
            let _ = write.send(close_frame(reason)).await;
            while read.next().await.is_some() {}
        }
        ServerBehavior::Converse { replies, binary } => {
            let _ = write.send(setup_complete(binary)).await;

            let Some(content) = next_json(&mut read).await else {
                return;
            };
            let _ = received.send(content);

            for reply in replies {
                let _ = write.send(Message::Text(reply.to_string().into())).await;
            }

            while let Some(Ok(message)) = read.next().await {
                if let Message::Close(_) = message {
                    break;
                }
            }
        }
    }
}

fn setup_complete(binary: bool) -> Message {
    let payload = json!({"setupComplete": {}}).to_string();
    if binary {
        Message::Binary(payload.into_bytes().into())
    } else {
        Message::Text(payload.into())
    }
}

fn close_frame(reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Policy,
        reason: reason.into(),
    }))
}

async fn next_json<S>(read: &mut S) -> Option<Value>
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(Ok(message)) = read.next().await {
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Binary(data) => return serde_json::from_slice(&data).ok(),
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}
