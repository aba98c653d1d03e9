//! CORS middleware
//!
//! Adds CORS headers to every response, preflight included:
//! - Allow-listed origin: the origin is echoed back with `Vary: Origin`, plus
//!   `Access-Control-Allow-Credentials: true` when enabled
//! - Anything else: wildcard origin, credentials never allowed
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use live_stream_gateway::middleware::cors_middleware;
//!
//! let app = Router::new()
//!     .route("/stream", post(stream_post))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         cors_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::CorsConfig;
use crate::state::AppState;

/// Compute the CORS headers for a request origin.
pub fn cors_headers(
    cors: &CorsConfig,
    origin: Option<&HeaderValue>,
) -> Vec<(HeaderName, HeaderValue)> {
    let allowed = origin.filter(|value| {
        value
            .to_str()
            .map(|origin| cors.allowed_origins.allows(origin))
            .unwrap_or(false)
    });

    match allowed {
        Some(origin) => {
            let mut headers = vec![
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone()),
                (header::VARY, HeaderValue::from_static("Origin")),
            ];
            if cors.allow_credentials {
                headers.push((
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                ));
            }
            headers
        }
        None => vec![(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        )],
    }
}

/// Middleware that applies [`cors_headers`] to every response.
pub async fn cors_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    for (name, value) in cors_headers(&state.config.cors, origin.as_ref()) {
        if name == header::VARY {
            headers.append(name, value);
        } else {
            headers.insert(name, value);
        }
    }

    response
}
