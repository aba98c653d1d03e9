use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::{AllowedOrigins, ConfigError, CorsConfig, DEFAULT_HOST, DEFAULT_PORT, ServerConfig};
use super::live::{LiveSettings, LiveSettingsSource};
use crate::core::live::GeminiLiveConfig;
use crate::core::live::gemini::{DEFAULT_CONNECT_TIMEOUT, GEMINI_DEFAULT_LIVE_MODEL};
use crate::core::turns::DEFAULT_TURN;

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Credential settings are not captured here; they are re-read from the
    /// environment for every request.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_string("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = env_parse::<u16>("PORT", "expected a port number")?.unwrap_or(DEFAULT_PORT);

        Ok(ServerConfig {
            host,
            port,
            live: LiveSettingsSource::Environment,
            gemini: gemini_config_from_env()?,
            cors: cors_config_from_env()?,
        })
    }
}

impl LiveSettings {
    /// Read credential and model settings from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LiveSettings {
            api_key: env_string("GEMINI_API_KEY").or_else(|| env_string("GOOGLE_API_KEY")),
            use_hosted: env_bool("GOOGLE_GENAI_USE_VERTEXAI")?.unwrap_or(false),
            project: env_string("GOOGLE_CLOUD_PROJECT"),
            location: env_string("GOOGLE_CLOUD_LOCATION"),
            api_version: env_string("GOOGLE_GENAI_API_VERSION"),
            model: env_string("LIVE_MODEL").unwrap_or_else(|| GEMINI_DEFAULT_LIVE_MODEL.to_string()),
            default_turn: env_string("LIVE_DEFAULT_TURN").unwrap_or_else(|| DEFAULT_TURN.to_string()),
        })
    }
}

fn gemini_config_from_env() -> Result<GeminiLiveConfig, ConfigError> {
    let response_modalities = env_string("LIVE_RESPONSE_MODALITIES")
        .map(|raw| parse_modalities(&raw))
        .unwrap_or_else(|| vec!["TEXT".to_string()]);

    let connect_timeout = match env_parse::<u64>("LIVE_CONNECT_TIMEOUT_SECONDS", "expected seconds")? {
        Some(0) => {
            return Err(ConfigError::invalid(
                "LIVE_CONNECT_TIMEOUT_SECONDS",
                "0",
                "must be greater than zero",
            ));
        }
        Some(seconds) => Duration::from_secs(seconds),
        None => DEFAULT_CONNECT_TIMEOUT,
    };

    Ok(GeminiLiveConfig {
        response_modalities,
        connect_timeout,
        ws_base_url: env_string("LIVE_WS_BASE_URL"),
        rest_base_url: env_string("LIVE_REST_BASE_URL"),
        access_token: env_string("GOOGLE_CLOUD_ACCESS_TOKEN"),
    })
}

fn cors_config_from_env() -> Result<CorsConfig, ConfigError> {
    Ok(CorsConfig {
        allowed_origins: env_string("CORS_ALLOWED_ORIGINS")
            .map(|raw| AllowedOrigins::parse(&raw))
            .unwrap_or_default(),
        allow_credentials: env_bool("CORS_ALLOW_CREDENTIALS")?.unwrap_or(false),
    })
}

/// Comma separated modality list, upper-cased
pub(super) fn parse_modalities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

/// Parse a boolean flag the way shells usually spell them
pub(super) fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid(name, raw, "expected true or false")),
    }
}

/// Trimmed, non-empty environment variable
fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
    env_string(name).map(|raw| parse_bool(name, &raw)).transpose()
}

fn env_parse<T: FromStr>(name: &str, reason: &str) -> Result<Option<T>, ConfigError> {
    env_string(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| ConfigError::invalid(name, raw.as_str(), reason))
        })
        .transpose()
}
