//! Gemini Live endpoints and connector configuration.

use std::time::Duration;

use url::Url;

use crate::core::live::base::{LiveCredential, LiveError, LiveResult, LiveTarget};

/// Developer API host.
pub const GEMINI_API_HOST: &str = "generativelanguage.googleapis.com";

/// Default API version in API-key mode.
pub const GEMINI_DEFAULT_API_VERSION: &str = "v1beta";

/// Default API version in hosted mode.
pub const GEMINI_HOSTED_DEFAULT_API_VERSION: &str = "v1beta1";

/// Default live model.
pub const GEMINI_DEFAULT_LIVE_MODEL: &str = "gemini-2.0-flash-live-001";

/// Default time allowed for the WebSocket upgrade plus the setup handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connector-level configuration shared by every session.
#[derive(Debug, Clone)]
pub struct GeminiLiveConfig {
    /// Response modalities requested in the setup message (e.g. "TEXT", "AUDIO")
    pub response_modalities: Vec<String>,
    /// Upgrade + setup handshake deadline
    pub connect_timeout: Duration,
    /// Replaces `wss://<host>` of the WebSocket endpoint
    pub ws_base_url: Option<String>,
    /// Replaces `https://<host>` of the REST endpoint used by the health probe
    pub rest_base_url: Option<String>,
    /// Static bearer token for hosted mode; Application Default Credentials are used when unset
    pub access_token: Option<String>,
}

impl Default for GeminiLiveConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec!["TEXT".to_string()],
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ws_base_url: None,
            rest_base_url: None,
            access_token: None,
        }
    }
}

impl GeminiLiveConfig {
    /// WebSocket endpoint for a target.
    pub fn ws_url(&self, target: &LiveTarget) -> LiveResult<Url> {
        let version = api_version(target);
        let (base, path) = match &target.credential {
            LiveCredential::ApiKey(_) => (
                format!("wss://{GEMINI_API_HOST}"),
                format!(
                    "/ws/google.ai.generativelanguage.{version}.GenerativeService.BidiGenerateContent"
                ),
            ),
            LiveCredential::Hosted { location, .. } => (
                format!("wss://{}", hosted_host(location)),
                format!("/ws/google.cloud.aiplatform.{version}.LlmBidiService/BidiGenerateContent"),
            ),
        };
        let base = self.ws_base_url.clone().unwrap_or(base);

        let mut url = parse_url(&base, &path)?;
        if let LiveCredential::ApiKey(key) = &target.credential {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    /// REST endpoint probed by the health check.
    pub fn probe_url(&self, target: &LiveTarget) -> LiveResult<Url> {
        let version = api_version(target);
        let (base, path) = match &target.credential {
            LiveCredential::ApiKey(_) => (
                format!("https://{GEMINI_API_HOST}"),
                format!("/{version}/models"),
            ),
            LiveCredential::Hosted { location, .. } => (
                format!("https://{}", hosted_host(location)),
                format!("/{version}/{}", model_resource(target)),
            ),
        };
        let base = self.rest_base_url.clone().unwrap_or(base);

        let mut url = parse_url(&base, &path)?;
        if let LiveCredential::ApiKey(key) = &target.credential {
            url.query_pairs_mut()
                .append_pair("key", key)
                .append_pair("pageSize", "1");
        }
        Ok(url)
    }
}

fn parse_url(base: &str, path: &str) -> LiveResult<Url> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&raw)
        .map_err(|e| LiveError::InvalidConfiguration(format!("Invalid endpoint '{raw}': {e}")))
}

fn api_version(target: &LiveTarget) -> &str {
    match target.api_version.as_deref() {
        Some(version) if !version.is_empty() => version,
        _ if target.credential.is_hosted() => GEMINI_HOSTED_DEFAULT_API_VERSION,
        _ => GEMINI_DEFAULT_API_VERSION,
    }
}

fn hosted_host(location: &str) -> String {
    if location == "global" {
        "aiplatform.googleapis.com".to_string()
    } else {
        format!("{location}-aiplatform.googleapis.com")
    }
}

/// Fully qualified model resource name expected by the setup message.
pub fn model_resource(target: &LiveTarget) -> String {
    let model = target.model.trim();
    match &target.credential {
        LiveCredential::ApiKey(_) => {
            if model.starts_with("models/") || model.starts_with("tunedModels/") {
                model.to_string()
            } else {
                format!("models/{model}")
            }
        }
        LiveCredential::Hosted { project, location } => {
            if model.starts_with("projects/") {
                model.to_string()
            } else if model.starts_with("publishers/") {
                format!("projects/{project}/locations/{location}/{model}")
            } else {
                format!("projects/{project}/locations/{location}/publishers/google/models/{model}")
            }
        }
    }
}
