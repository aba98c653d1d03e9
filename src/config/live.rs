//! Credential settings for the live service.
//!
//! Settings are resolved for every request rather than once at startup, so a
//! process picks up rotated credentials from its environment without a restart.

use std::fmt;

use crate::config::ConfigError;
use crate::core::live::gemini::GEMINI_DEFAULT_LIVE_MODEL;
use crate::core::live::{LiveCredential, LiveTarget};
use crate::core::turns::DEFAULT_TURN;

/// Credential and model settings for opening a live session.
#[derive(Clone, PartialEq, Eq)]
pub struct LiveSettings {
    /// Developer API key
    pub api_key: Option<String>,
    /// Use hosted (Vertex AI) credentials instead of an API key
    pub use_hosted: bool,
    pub project: Option<String>,
    pub location: Option<String>,
    /// API version override
    pub api_version: Option<String>,
    /// Model used when the request does not name one
    pub model: String,
    /// Turn sent when the request supplies none
    pub default_turn: String,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            use_hosted: false,
            project: None,
            location: None,
            api_version: None,
            model: GEMINI_DEFAULT_LIVE_MODEL.to_string(),
            default_turn: DEFAULT_TURN.to_string(),
        }
    }
}

impl fmt::Debug for LiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("use_hosted", &self.use_hosted)
            .field("project", &self.project)
            .field("location", &self.location)
            .field("api_version", &self.api_version)
            .field("model", &self.model)
            .field("default_turn", &self.default_turn)
            .finish()
    }
}

impl Drop for LiveSettings {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.api_key {
            key.zeroize();
        }
    }
}

impl LiveSettings {
    /// Settings for API-key mode
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let mut settings = Self::default();
        settings.api_key = Some(api_key.into());
        settings
    }

    /// Settings for hosted mode
    pub fn hosted(project: impl Into<String>, location: impl Into<String>) -> Self {
        let mut settings = Self::default();
        settings.use_hosted = true;
        settings.project = Some(project.into());
        settings.location = Some(location.into());
        settings
    }

    /// Validate the settings into a credential.
    ///
    /// With the hosted flag set, project and location are both required. Without
    /// it an API key wins; a project/location pair alone still selects hosted mode.
    pub fn credential(&self) -> Result<LiveCredential, ConfigError> {
        let project = non_empty(&self.project);
        let location = non_empty(&self.location);

        if self.use_hosted {
            return match (project, location) {
                (Some(project), Some(location)) => Ok(LiveCredential::Hosted {
                    project: project.to_string(),
                    location: location.to_string(),
                }),
                (project, location) => {
                    let missing: Vec<&str> = [
                        project.is_none().then_some("GOOGLE_CLOUD_PROJECT"),
                        location.is_none().then_some("GOOGLE_CLOUD_LOCATION"),
                    ]
                    .into_iter()
                    .flatten()
                    .collect();
                    Err(ConfigError::MissingCredential(format!(
                        "Vertex AI mode is enabled but {} is not set",
                        missing.join(" and ")
                    )))
                }
            };
        }

        if let Some(key) = non_empty(&self.api_key) {
            return Ok(LiveCredential::ApiKey(key.to_string()));
        }

        match (project, location) {
            (Some(project), Some(location)) => Ok(LiveCredential::Hosted {
                project: project.to_string(),
                location: location.to_string(),
            }),
            _ => Err(ConfigError::MissingCredential(
                "Missing GEMINI_API_KEY (or GOOGLE_API_KEY) and no Vertex AI project/location configured"
                    .to_string(),
            )),
        }
    }

    /// Connection target for a request, honouring a per-request model override.
    pub fn target(&self, model: Option<&str>) -> Result<LiveTarget, ConfigError> {
        let credential = self.credential()?;
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.model);

        Ok(LiveTarget {
            credential,
            model: model.to_string(),
            api_version: non_empty(&self.api_version).map(str::to_string),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Where live settings come from.
#[derive(Debug, Clone)]
pub enum LiveSettingsSource {
    /// Re-read from environment variables for every request
    Environment,
    /// Fixed at startup (YAML file or tests)
    Fixed(LiveSettings),
}

impl LiveSettingsSource {
    pub fn resolve(&self) -> Result<LiveSettings, ConfigError> {
        match self {
            LiveSettingsSource::Environment => LiveSettings::from_env(),
            LiveSettingsSource::Fixed(settings) => Ok(settings.clone()),
        }
    }
}
