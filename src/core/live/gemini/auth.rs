//! Authorization headers for hosted mode.
//!
//! Hosted sessions authenticate with an OAuth bearer token. A token supplied
//! through configuration is used as-is; otherwise credentials come from
//! Application Default Credentials (`GOOGLE_APPLICATION_CREDENTIALS`, gcloud
//! user credentials, or the metadata server of the machine we run on).

use google_cloud_auth::credentials::{Builder, CacheableResource, Credentials};
use http::{Extensions, HeaderMap, HeaderValue, header};
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use crate::core::live::base::{LiveError, LiveResult};

/// OAuth scope for Vertex AI
pub const GOOGLE_CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Where hosted credentials come from
pub enum CredentialSource {
    /// Static bearer token
    Token(Zeroizing<String>),
    /// Application Default Credentials
    ApplicationDefault,
}

impl CredentialSource {
    /// A non-empty configured token wins over ADC.
    pub fn from_config(token: Option<&str>) -> Self {
        match token.filter(|t| !t.is_empty()) {
            Some(token) => CredentialSource::Token(Zeroizing::new(token.to_string())),
            None => CredentialSource::ApplicationDefault,
        }
    }
}

/// Produces `Authorization` headers for hosted requests.
///
/// ADC credentials are built on first use and reused afterwards; the
/// credentials cache and refresh the token themselves.
pub struct GoogleAuthClient {
    source: CredentialSource,
    scopes: Vec<String>,
    credentials: OnceCell<Credentials>,
}

impl GoogleAuthClient {
    pub fn new(source: CredentialSource, scopes: &[&str]) -> Self {
        Self {
            source,
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
            credentials: OnceCell::new(),
        }
    }

    /// Headers to attach to a hosted request.
    pub async fn headers(&self) -> LiveResult<HeaderMap> {
        let token = match &self.source {
            CredentialSource::Token(token) => token,
            CredentialSource::ApplicationDefault => return self.adc_headers().await,
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|e| LiveError::AuthenticationFailed(format!("Invalid access token: {e}")))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    async fn adc_headers(&self) -> LiveResult<HeaderMap> {
        let credentials = self
            .credentials
            .get_or_try_init(|| async {
                tracing::debug!("Loading Application Default Credentials");
                Builder::default()
                    .with_scopes(self.scopes.clone())
                    .build()
                    .map_err(|e| {
                        LiveError::AuthenticationFailed(format!(
                            "No access token configured and Application Default Credentials unavailable: {e}"
                        ))
                    })
            })
            .await?;

        match credentials.headers(Extensions::new()).await {
            Ok(CacheableResource::New { data, .. }) => Ok(data),
            Ok(CacheableResource::NotModified) => Err(LiveError::AuthenticationFailed(
                "Credentials returned no headers".to_string(),
            )),
            Err(e) => Err(LiveError::AuthenticationFailed(format!(
                "Failed to obtain access token: {e}"
            ))),
        }
    }
}
