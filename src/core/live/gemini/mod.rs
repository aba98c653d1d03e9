//! Gemini Live API module.
//!
//! Bidirectional text generation sessions over the Gemini Live WebSocket API,
//! in both the developer API-key mode and the hosted (Vertex AI) mode.
//!
//! # Protocol
//!
//! 1. WebSocket upgrade (`?key=` query in API-key mode, bearer token when hosted)
//! 2. `setup` message with the model resource and response modalities
//! 3. `setupComplete` from the server opens the session
//! 4. `clientContent` carries the user turns
//! 5. `serverContent` messages stream back until `turnComplete`
//!
//! # Example
//!
//! ```rust,ignore
//! use live_stream_gateway::core::live::{GeminiLiveConfig, GeminiLiveConnector};
//!
//! let connector = GeminiLiveConnector::new(GeminiLiveConfig {
//!     response_modalities: vec!["TEXT".to_string()],
//!     ..Default::default()
//! });
//! ```

mod auth;
mod client;
mod config;
mod messages;

pub use client::{GeminiLiveConnector, LOCAL_CLOSE_REASON};
pub use config::{
    DEFAULT_CONNECT_TIMEOUT, GEMINI_API_HOST, GEMINI_DEFAULT_API_VERSION,
    GEMINI_DEFAULT_LIVE_MODEL, GEMINI_HOSTED_DEFAULT_API_VERSION, GeminiLiveConfig,
    model_resource,
};
pub use messages::{
    ClientContent, ClientMessage, Content, GenerationConfig, Part, SetupMessage,
    is_setup_complete, is_turn_complete,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_keeps_config() {
        let connector = GeminiLiveConnector::new(GeminiLiveConfig::default());
        assert_eq!(connector.config().response_modalities, vec!["TEXT"]);
        assert_eq!(connector.config().connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_default_model() {
        assert_eq!(GEMINI_DEFAULT_LIVE_MODEL, "gemini-2.0-flash-live-001");
    }
}
