//! Configuration module for the live stream gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `live`: Credential settings for the live service, resolved per request
//! - `yaml`: YAML configuration file loading
//!
//! # Example
//! ```rust,no_run
//! use live_stream_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::core::live::GeminiLiveConfig;

mod env;
mod live;
mod yaml;

pub use live::{LiveSettings, LiveSettingsSource};
pub use yaml::YamlConfig;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 3001;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No usable credential for the live service
    #[error("{0}")]
    MissingCredential(String),

    /// A setting could not be parsed
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// Config file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for this schema
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub(crate) fn invalid(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Origins allowed to read streaming responses
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowedOrigins {
    /// Wildcard; credentials are never allowed
    #[default]
    Any,
    /// Explicit allow-list; matching origins are echoed back
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parse a comma separated list. An empty list or any `*` entry means wildcard.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }

    /// Whether `origin` is explicitly allow-listed
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            AllowedOrigins::Any => false,
            AllowedOrigins::List(origins) => origins.iter().any(|allowed| allowed == origin),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: AllowedOrigins,
    /// Only honoured for allow-listed origins
    pub allow_credentials: bool,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Where credential settings come from for each request
    pub live: LiveSettingsSource,

    /// Connector settings shared by every session
    pub gemini: GeminiLiveConfig,

    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            live: LiveSettingsSource::Environment,
            gemini: GeminiLiveConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

/// Zeroize the hosted access token when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut token) = self.gemini.access_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Environment variables (with defaults) form the base configuration and
    /// the YAML file overrides specific values. The `.env` file is loaded in
    /// `main` before this is called.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables or YAML values have invalid formats
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::from_env()?;
        yaml_config.apply(&mut config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Credential settings for one request
    pub fn live_settings(&self) -> Result<LiveSettings, ConfigError> {
        self.live.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins_parse() {
        assert_eq!(AllowedOrigins::parse("*"), AllowedOrigins::Any);
        assert_eq!(AllowedOrigins::parse(""), AllowedOrigins::Any);
        assert_eq!(AllowedOrigins::parse(" , "), AllowedOrigins::Any);
        assert_eq!(
            AllowedOrigins::parse("https://a.example, *"),
            AllowedOrigins::Any
        );
        assert_eq!(
            AllowedOrigins::parse("https://a.example, https://b.example"),
            AllowedOrigins::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn test_allowed_origins_allows() {
        let origins = AllowedOrigins::parse("https://a.example");
        assert!(origins.allows("https://a.example"));
        assert!(!origins.allows("https://b.example"));
        assert!(!AllowedOrigins::Any.allows("https://a.example"));
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:3001");
        assert!(matches!(config.live, LiveSettingsSource::Environment));
        assert_eq!(config.cors, CorsConfig::default());
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::invalid("PORT", "abc", "expected a port number");
        assert_eq!(
            err.to_string(),
            "Invalid value for PORT: 'abc' (expected a port number)"
        );
    }
}
