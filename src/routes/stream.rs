//! Streaming route configuration

use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::stream::{stream_get, stream_options, stream_post};
use crate::state::AppState;
use std::sync::Arc;

/// Create the streaming router
///
/// # Endpoints
///
/// - `POST /stream` - JSON body `{ "input"?: string | string[], "model"?: string }`
/// - `GET /stream` - query `input` (repeatable), `model`; `health=1` probes instead
/// - `OPTIONS /stream` - CORS preflight
///
/// # Protocol
///
/// Successful requests answer `200 text/event-stream`, one frame per event:
///
/// ```text
/// data: {"type":"open"}
///
/// data: {"type":"message","payload":{...}}
///
/// data: {"type":"end","message":"turn_complete"}
/// ```
///
/// Failures before the session opens answer `500 {"error": "..."}`.
pub fn create_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/stream",
            post(stream_post).get(stream_get).options(stream_options),
        )
        .layer(TraceLayer::new_for_http())
}
