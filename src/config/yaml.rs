use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::env::parse_modalities;
use super::live::{LiveSettings, LiveSettingsSource};
use super::{AllowedOrigins, ConfigError, ServerConfig};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// live:
///   api_key: "your-gemini-api-key"
///   # or hosted credentials
///   use_vertexai: true
///   project: "my-project"
///   location: "us-central1"
///   api_version: "v1beta"
///   model: "gemini-2.0-flash-live-001"
///   default_turn: "Hello!"
///   response_modalities: ["TEXT"]
///   connect_timeout_seconds: 15
///   ws_base_url: "wss://generativelanguage.googleapis.com"
///   rest_base_url: "https://generativelanguage.googleapis.com"
///   access_token: "ya29..."
///
/// cors:
///   allowed_origins: "https://app.example.com,https://admin.example.com"
///   allow_credentials: true
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub live: Option<LiveYaml>,
    pub cors: Option<CorsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Live service configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LiveYaml {
    pub api_key: Option<String>,
    pub use_vertexai: Option<bool>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub api_version: Option<String>,
    pub model: Option<String>,
    pub default_turn: Option<String>,
    pub response_modalities: Option<Vec<String>>,
    pub connect_timeout_seconds: Option<u64>,
    pub ws_base_url: Option<String>,
    pub rest_base_url: Option<String>,
    pub access_token: Option<String>,
}

impl LiveYaml {
    /// Whether the file pins any per-request setting
    fn has_settings(&self) -> bool {
        self.api_key.is_some()
            || self.use_vertexai.is_some()
            || self.project.is_some()
            || self.location.is_some()
            || self.api_version.is_some()
            || self.model.is_some()
            || self.default_turn.is_some()
    }
}

/// CORS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CorsYaml {
    /// Comma separated list or "*"
    pub allowed_origins: Option<String>,
    pub allow_credentials: Option<bool>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply the values present in the file on top of `config`.
    ///
    /// When the file names any credential or model setting, the per-request
    /// settings are frozen: the environment is read once and the file overrides it.
    pub fn apply(self, config: &mut ServerConfig) -> Result<(), ConfigError> {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
        }

        if let Some(live) = self.live {
            if live.has_settings() {
                let mut settings = LiveSettings::from_env()?;
                if live.api_key.is_some() {
                    settings.api_key = live.api_key;
                }
                if let Some(use_hosted) = live.use_vertexai {
                    settings.use_hosted = use_hosted;
                }
                if live.project.is_some() {
                    settings.project = live.project;
                }
                if live.location.is_some() {
                    settings.location = live.location;
                }
                if live.api_version.is_some() {
                    settings.api_version = live.api_version;
                }
                if let Some(model) = live.model {
                    settings.model = model;
                }
                if let Some(turn) = live.default_turn {
                    settings.default_turn = turn;
                }
                config.live = LiveSettingsSource::Fixed(settings);
            }

            if let Some(modalities) = live.response_modalities {
                config.gemini.response_modalities = parse_modalities(&modalities.join(","));
            }
            if let Some(seconds) = live.connect_timeout_seconds {
                if seconds == 0 {
                    return Err(ConfigError::invalid(
                        "live.connect_timeout_seconds",
                        "0",
                        "must be greater than zero",
                    ));
                }
                config.gemini.connect_timeout = Duration::from_secs(seconds);
            }
            if live.ws_base_url.is_some() {
                config.gemini.ws_base_url = live.ws_base_url;
            }
            if live.rest_base_url.is_some() {
                config.gemini.rest_base_url = live.rest_base_url;
            }
            if live.access_token.is_some() {
                config.gemini.access_token = live.access_token;
            }
        }

        if let Some(cors) = self.cors {
            if let Some(origins) = cors.allowed_origins {
                config.cors.allowed_origins = AllowedOrigins::parse(&origins);
            }
            if let Some(allow) = cors.allow_credentials {
                config.cors.allow_credentials = allow;
            }
        }

        Ok(())
    }
}
