//! Session bridge.
//!
//! Maps one inbound request onto one live session and re-emits everything the
//! session produces as SSE frames.
//!
//! # Lifecycle
//!
//! ```text
//! Initializing -> Connecting -> Open -> Terminating -> Closed
//! ```
//!
//! - Initializing: credentials are validated; failure is returned to the caller
//!   before any frame exists.
//! - Connecting: the connector opens the session; failure is returned the same way.
//! - Open: `open` is written, the turns are submitted and remote events are
//!   forwarded in arrival order.
//! - Terminating: the session is closed and the stream finalized, exactly once,
//!   whichever of turn completion, remote fault, remote close or client
//!   disconnect came first.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{ConfigError, LiveSettings};
use crate::core::events::{END_CLOSED, END_ERROR, END_TURN_COMPLETE, OutboundEvent};
use crate::core::live::{LiveConnector, LiveError, LiveEvent, LiveSession, is_turn_complete};
use crate::core::turns::{TurnInput, TurnSequence, normalize_turns};

mod sink;

pub use sink::{FRAME_CHANNEL_CAPACITY, FrameSink, FrameStream, frame_channel};

/// Bridge lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Initializing,
    Connecting,
    Open,
    Terminating,
    Closed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeState::Initializing => write!(f, "Initializing"),
            BridgeState::Connecting => write!(f, "Connecting"),
            BridgeState::Open => write!(f, "Open"),
            BridgeState::Terminating => write!(f, "Terminating"),
            BridgeState::Closed => write!(f, "Closed"),
        }
    }
}

/// Failures before the stream starts
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Failed to connect to live service: {0}")]
    Connection(#[from] LiveError),
}

/// What a single request asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeRequest {
    pub input: TurnInput,
    /// Model override
    pub model: Option<String>,
}

/// Bridges one request to one live session.
pub struct SessionBridge {
    connector: Arc<dyn LiveConnector>,
    settings: LiveSettings,
    state: BridgeState,
}

impl SessionBridge {
    pub fn new(connector: Arc<dyn LiveConnector>, settings: LiveSettings) -> Self {
        Self {
            connector,
            settings,
            state: BridgeState::Initializing,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Validate, connect and start streaming.
    ///
    /// On success the returned stream yields frames until the session ends;
    /// the session itself is driven by a spawned task that owns it.
    pub async fn start(mut self, request: BridgeRequest) -> Result<FrameStream, BridgeError> {
        let turns = normalize_turns(request.input, &self.settings.default_turn);
        let target = self.settings.target(request.model.as_deref())?;

        self.state = BridgeState::Connecting;
        tracing::debug!(model = %target.model, state = %self.state, "Opening live session");

        let connection = self.connector.connect(&target).await.map_err(|e| {
            tracing::error!(model = %target.model, "Failed to open live session: {}", e);
            e
        })?;

        let session_id = connection.session.id().to_string();
        tracing::info!(session_id = %session_id, model = %target.model, turns = turns.len(), "Live session open");

        let (sink, stream) = frame_channel();
        let reactor = Reactor {
            session: connection.session,
            events: connection.events,
            sink,
            state: BridgeState::Open,
            session_id,
        };
        tokio::spawn(reactor.run(turns));

        Ok(stream)
    }
}

/// What woke the reactor
enum Signal {
    Event(Option<LiveEvent>),
    Cancelled,
}

/// Drives one open session until it terminates.
struct Reactor {
    session: Box<dyn LiveSession>,
    events: mpsc::Receiver<LiveEvent>,
    sink: FrameSink,
    state: BridgeState,
    session_id: String,
}

impl Reactor {
    async fn run(mut self, turns: TurnSequence) {
        if !self.sink.emit(OutboundEvent::Open).await {
            self.cancel().await;
            return;
        }

        if let Err(e) = self.session.send_turns(&turns).await {
            tracing::error!(session_id = %self.session_id, "Failed to submit turns: {}", e);
            self.fail(format!("Failed to send turns: {e}")).await;
            return;
        }

        loop {
            let signal = tokio::select! {
                biased;
                _ = self.sink.closed() => Signal::Cancelled,
                event = self.events.recv() => Signal::Event(event),
            };

            let done = match signal {
                Signal::Cancelled => {
                    self.cancel().await;
                    true
                }
                Signal::Event(Some(LiveEvent::Message(payload))) => self.on_message(payload).await,
                Signal::Event(Some(LiveEvent::Error(error))) => {
                    tracing::error!(session_id = %self.session_id, error = %error, "Live session fault");
                    self.fail(error).await;
                    true
                }
                Signal::Event(Some(LiveEvent::Close(reason))) => {
                    self.on_close(reason).await;
                    true
                }
                // Event source ended without saying why
                Signal::Event(None) => {
                    self.on_close(String::new()).await;
                    true
                }
            };

            if done {
                break;
            }
        }
    }

    /// Forward a server message. Returns true once the stream is finished.
    async fn on_message(&mut self, payload: Value) -> bool {
        let turn_complete = is_turn_complete(&payload);
        tracing::debug!(session_id = %self.session_id, turn_complete, "Forwarding message");

        if !self.sink.emit(OutboundEvent::Message { payload }).await {
            self.cancel().await;
            return true;
        }

        if turn_complete {
            self.transition(BridgeState::Terminating);
            self.session.close().await;
            self.finish(END_TURN_COMPLETE).await;
            return true;
        }
        false
    }

    /// Remote fault: `error`, close the session, report its close, `end`.
    async fn fail(&mut self, error: String) {
        self.transition(BridgeState::Terminating);

        if !self.sink.emit(OutboundEvent::Error { error }).await {
            self.cancel().await;
            return;
        }

        self.session.close().await;

        // The close that followed the fault (if any) is queued by now
        while let Ok(event) = self.events.try_recv() {
            if let LiveEvent::Close(reason) = event {
                self.sink.emit(OutboundEvent::Close { reason }).await;
                break;
            }
        }

        self.finish(END_ERROR).await;
    }

    async fn on_close(&mut self, reason: String) {
        tracing::info!(session_id = %self.session_id, reason = %reason, "Live session closed by remote");
        self.transition(BridgeState::Terminating);

        self.sink.emit(OutboundEvent::Close { reason }).await;
        self.session.close().await;
        self.finish(END_CLOSED).await;
    }

    /// Client went away: release the session and write nothing further.
    async fn cancel(&mut self) {
        tracing::warn!(session_id = %self.session_id, "Client disconnected, closing live session");
        self.transition(BridgeState::Terminating);

        self.session.close().await;
        self.sink.finalize(None).await;
        self.transition(BridgeState::Closed);
    }

    async fn finish(&mut self, reason: &str) {
        self.sink.finalize(Some(reason)).await;
        self.transition(BridgeState::Closed);
        tracing::info!(session_id = %self.session_id, reason, "Stream finished");
    }

    fn transition(&mut self, state: BridgeState) {
        if self.state != state {
            tracing::debug!(session_id = %self.session_id, from = %self.state, to = %state, "Bridge state change");
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::parse_frames;
    use crate::core::live::{LiveConnection, LiveResult, LiveTarget, ProbeFailure};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        turns: Mutex<Vec<Vec<String>>>,
        close_calls: AtomicUsize,
        closed: AtomicBool,
    }

    struct ScriptedSession {
        recorder: Arc<Recorder>,
        fail_send: bool,
    }

    #[async_trait]
    impl LiveSession for ScriptedSession {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn send_turns(&self, turns: &TurnSequence) -> LiveResult<()> {
            if self.fail_send {
                return Err(LiveError::NotConnected);
            }
            self.recorder
                .turns
                .lock()
                .unwrap()
                .push(turns.as_slice().to_vec());
            Ok(())
        }

        async fn close(&self) {
            self.recorder.close_calls.fetch_add(1, Ordering::SeqCst);
            self.recorder.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.recorder.closed.load(Ordering::SeqCst)
        }
    }

    struct ScriptedConnector {
        recorder: Arc<Recorder>,
        events: Mutex<Option<mpsc::Receiver<LiveEvent>>>,
        fail_connect: bool,
        fail_send: bool,
        connects: AtomicUsize,
    }

    impl ScriptedConnector {
        fn new(events: mpsc::Receiver<LiveEvent>) -> Self {
            Self {
                recorder: Arc::new(Recorder::default()),
                events: Mutex::new(Some(events)),
                fail_connect: false,
                fail_send: false,
                connects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LiveConnector for ScriptedConnector {
        async fn connect(&self, _target: &LiveTarget) -> LiveResult<LiveConnection> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(LiveError::ConnectionFailed("refused".to_string()));
            }
            let events = self
                .events
                .lock()
                .unwrap()
                .take()
                .ok_or(LiveError::NotConnected)?;
            Ok(LiveConnection {
                session: Box::new(ScriptedSession {
                    recorder: self.recorder.clone(),
                    fail_send: self.fail_send,
                }),
                events,
            })
        }

        async fn probe(&self, _target: &LiveTarget) -> Result<(), ProbeFailure> {
            Ok(())
        }
    }

    /// Connector preloaded with events; the sender is returned to keep the channel open.
    fn scripted(events: Vec<LiveEvent>) -> (ScriptedConnector, mpsc::Sender<LiveEvent>) {
        let (tx, rx) = mpsc::channel(16);
        for event in events {
            tx.try_send(event).unwrap();
        }
        (ScriptedConnector::new(rx), tx)
    }

    async fn run(connector: Arc<ScriptedConnector>, request: BridgeRequest) -> Vec<OutboundEvent> {
        let bridge = SessionBridge::new(connector, LiveSettings::with_api_key("test-key"));
        let stream = bridge.start(request).await.unwrap();
        let frames: Vec<_> = stream
            .into_stream()
            .map(|frame| frame.unwrap())
            .collect()
            .await;
        let text: String = frames
            .iter()
            .map(|frame| std::str::from_utf8(frame).unwrap().to_string())
            .collect();
        parse_frames(&text)
    }

    fn kinds(events: &[OutboundEvent]) -> Vec<&'static str> {
        events.iter().map(OutboundEvent::kind).collect()
    }

    #[tokio::test]
    async fn test_turn_complete_auto_closes() {
        let (connector, _tx) = scripted(vec![
            LiveEvent::Message(json!({"serverContent": {"modelTurn": {"parts": [{"text": "Hi"}]}}})),
            LiveEvent::Message(json!({"serverContent": {"turnComplete": true}})),
            LiveEvent::Close("late close".to_string()),
        ]);
        let connector = Arc::new(connector);

        let events = run(connector.clone(), BridgeRequest::default()).await;

        assert_eq!(kinds(&events), vec!["open", "message", "message", "end"]);
        assert_eq!(events[3], OutboundEvent::end("turn_complete"));
        assert_eq!(
            events[1],
            OutboundEvent::Message {
                payload: json!({"serverContent": {"modelTurn": {"parts": [{"text": "Hi"}]}}})
            }
        );
        assert_eq!(connector.recorder.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_then_close() {
        let (connector, _tx) = scripted(vec![
            LiveEvent::Error("boom".to_string()),
            LiveEvent::Close("remote closed".to_string()),
            LiveEvent::Message(json!({"late": true})),
        ]);
        let connector = Arc::new(connector);

        let events = run(connector.clone(), BridgeRequest::default()).await;

        assert_eq!(kinds(&events), vec!["open", "error", "close", "end"]);
        assert_eq!(
            events[1],
            OutboundEvent::Error {
                error: "boom".to_string()
            }
        );
        assert_eq!(
            events[2],
            OutboundEvent::Close {
                reason: "remote closed".to_string()
            }
        );
        assert_eq!(events[3], OutboundEvent::end("error"));
        assert!(connector.recorder.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_error_without_close() {
        let (connector, _tx) = scripted(vec![LiveEvent::Error("boom".to_string())]);

        let events = run(Arc::new(connector), BridgeRequest::default()).await;

        assert_eq!(kinds(&events), vec!["open", "error", "end"]);
        assert_eq!(events[2], OutboundEvent::end("error"));
    }

    #[tokio::test]
    async fn test_remote_close() {
        let (connector, _tx) = scripted(vec![
            LiveEvent::Message(json!({"serverContent": {}})),
            LiveEvent::Close("bye".to_string()),
            LiveEvent::Message(json!({"ignored": true})),
        ]);
        let connector = Arc::new(connector);

        let events = run(connector.clone(), BridgeRequest::default()).await;

        assert_eq!(kinds(&events), vec!["open", "message", "close", "end"]);
        assert_eq!(
            events[2],
            OutboundEvent::Close {
                reason: "bye".to_string()
            }
        );
        assert_eq!(events[3], OutboundEvent::end("closed"));
        assert_eq!(connector.recorder.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_source_ends_without_close() {
        let (connector, tx) = scripted(vec![LiveEvent::Message(json!({"n": 1}))]);
        drop(tx);

        let events = run(Arc::new(connector), BridgeRequest::default()).await;

        assert_eq!(kinds(&events), vec!["open", "message", "close", "end"]);
        assert_eq!(
            events[2],
            OutboundEvent::Close {
                reason: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_default_turn_submitted() {
        let (connector, _tx) = scripted(vec![LiveEvent::Close(String::new())]);
        let connector = Arc::new(connector);

        run(connector.clone(), BridgeRequest::default()).await;

        let turns = connector.recorder.turns.lock().unwrap().clone();
        assert_eq!(turns, vec![vec!["Hello!".to_string()]]);
    }

    #[tokio::test]
    async fn test_request_turns_submitted_in_order() {
        let (connector, _tx) = scripted(vec![LiveEvent::Close(String::new())]);
        let connector = Arc::new(connector);

        let request = BridgeRequest {
            input: TurnInput::Many(vec!["first".to_string(), "second".to_string()]),
            model: Some("other-model".to_string()),
        };
        run(connector.clone(), request).await;

        let turns = connector.recorder.turns.lock().unwrap().clone();
        assert_eq!(turns, vec![vec!["first".to_string(), "second".to_string()]]);
    }

    #[tokio::test]
    async fn test_send_failure_is_in_band() {
        let (mut connector, _tx) = scripted(vec![]);
        connector.fail_send = true;
        let connector = Arc::new(connector);

        let events = run(connector.clone(), BridgeRequest::default()).await;

        assert_eq!(kinds(&events), vec!["open", "error", "end"]);
        assert_eq!(events[2], OutboundEvent::end("error"));
        assert!(connector.recorder.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_credential_never_connects() {
        let (connector, _tx) = scripted(vec![]);
        let connector = Arc::new(connector);

        let bridge = SessionBridge::new(connector.clone(), LiveSettings::default());
        assert_eq!(bridge.state(), BridgeState::Initializing);

        let result = bridge.start(BridgeRequest::default()).await;
        match result {
            Err(BridgeError::Configuration(ConfigError::MissingCredential(message))) => {
                assert!(message.contains("GEMINI_API_KEY"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let (mut connector, _tx) = scripted(vec![]);
        connector.fail_connect = true;

        let bridge = SessionBridge::new(Arc::new(connector), LiveSettings::with_api_key("key"));
        let result = bridge.start(BridgeRequest::default()).await;

        let err = result.err().unwrap();
        assert!(matches!(err, BridgeError::Connection(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[tokio::test]
    async fn test_client_disconnect_closes_session() {
        let (connector, tx) = scripted(vec![]);
        let connector = Arc::new(connector);

        let bridge = SessionBridge::new(connector.clone(), LiveSettings::with_api_key("key"));
        let mut stream = Box::pin(
            bridge
                .start(BridgeRequest::default())
                .await
                .unwrap()
                .into_stream(),
        );

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(
            parse_frames(std::str::from_utf8(&first).unwrap()),
            vec![OutboundEvent::Open]
        );
        drop(stream);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !connector.recorder.closed.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session was not closed after disconnect");

        // Late events go nowhere
        let _ = tx.send(LiveEvent::Message(json!({"late": true}))).await;
        assert_eq!(connector.recorder.close_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BridgeState::Initializing.to_string(), "Initializing");
        assert_eq!(BridgeState::Terminating.to_string(), "Terminating");
    }
}
