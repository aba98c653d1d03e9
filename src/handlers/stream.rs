//! `/stream` handlers.
//!
//! POST and GET are thin adapters: they turn the request into a
//! [`BridgeRequest`] and hand it to a [`SessionBridge`]. Everything after that
//! (frames, termination) belongs to the bridge.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::bridge::{BridgeRequest, FrameStream, SessionBridge};
use crate::core::turns::TurnInput;
use crate::errors::app_error::AppResult;
use crate::state::AppState;

/// Content type of the event stream
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Methods advertised to preflight requests
pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Request headers allowed when the preflight does not ask for specific ones
pub const DEFAULT_ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Preflight cache lifetime in seconds
pub const PREFLIGHT_MAX_AGE: &str = "86400";

/// POST /stream
///
/// Body: `{ "input"?: string | string[], "model"?: string }`. Bodies that are
/// not JSON objects are accepted and treated as carrying no input.
pub async fn stream_post(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    let request = parse_body(&body);
    debug!(model = ?request.model, "POST /stream");
    stream(state, request).await
}

/// GET /stream
///
/// Query: `input` (repeatable), `model`, `health=1`.
pub async fn stream_get(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> AppResult<Response> {
    let query = StreamQuery::parse(query.as_deref().unwrap_or(""));
    if query.health {
        return health(state).await;
    }

    debug!(model = ?query.request.model, "GET /stream");
    stream(state, query.request).await
}

/// OPTIONS /stream
///
/// CORS origin headers are added by the CORS middleware.
pub async fn stream_options(headers: HeaderMap) -> Response {
    let allow_headers = headers
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOWED_HEADERS));

    (
        StatusCode::NO_CONTENT,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(PREFLIGHT_MAX_AGE),
            ),
        ],
    )
        .into_response()
}

async fn stream(state: Arc<AppState>, request: BridgeRequest) -> AppResult<Response> {
    let settings = state.config.live_settings()?;
    let bridge = SessionBridge::new(state.connector.clone(), settings);
    let frames = bridge.start(request).await?;
    Ok(event_stream_response(frames))
}

/// Validate configuration, then probe the live service without opening a session.
async fn health(state: Arc<AppState>) -> AppResult<Response> {
    let target = state.config.live_settings()?.target(None)?;
    state.connector.probe(&target).await?;

    info!(model = %target.model, "Health probe succeeded");
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn event_stream_response(frames: FrameStream) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-transform"),
            ),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Body::from_stream(frames.into_stream()),
    )
        .into_response()
}

fn parse_body(body: &[u8]) -> BridgeRequest {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
        return BridgeRequest::default();
    };

    BridgeRequest {
        input: TurnInput::from_json(fields.get("input")),
        model: fields
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Parsed GET query
#[derive(Debug, Default, PartialEq, Eq)]
struct StreamQuery {
    request: BridgeRequest,
    health: bool,
}

impl StreamQuery {
    fn parse(query: &str) -> Self {
        let mut inputs = Vec::new();
        let mut model = None;
        let mut health = false;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "input" => inputs.push(value.into_owned()),
                "model" => model = Some(value.into_owned()),
                "health" => health = matches!(value.as_ref(), "1" | "true"),
                _ => {}
            }
        }

        let input = match inputs.len() {
            0 => TurnInput::Absent,
            1 => TurnInput::Single(inputs.remove(0)),
            _ => TurnInput::Many(inputs),
        };

        StreamQuery {
            request: BridgeRequest { input, model },
            health,
        }
    }
}
