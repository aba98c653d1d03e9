use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::live::{GeminiLiveConnector, LiveConnector};

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    /// Opens live sessions; swapped for a scripted connector in tests
    pub connector: Arc<dyn LiveConnector>,
}

impl AppState {
    /// State backed by the Gemini Live connector
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let connector = Arc::new(GeminiLiveConnector::new(config.gemini.clone()));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: ServerConfig, connector: Arc<dyn LiveConnector>) -> Arc<Self> {
        Arc::new(Self { config, connector })
    }
}
