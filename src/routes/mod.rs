pub mod stream;

use axum::{Router, middleware};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::middleware::cors_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Assemble the full application: routes, CORS and security headers.
pub fn create_app(state: Arc<AppState>) -> Router {
    stream::create_stream_router()
        .layer(middleware::from_fn_with_state(state.clone(), cors_middleware))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
}
