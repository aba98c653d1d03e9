//! Error type for the HTTP boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::core::bridge::BridgeError;
use crate::core::live::ProbeFailure;

/// Failures reported as a non-streaming JSON response.
#[derive(Debug, Error)]
pub enum AppError {
    /// Credentials or settings are unusable
    #[error("{0}")]
    Configuration(String),

    /// The live session could not be opened
    #[error("{0}")]
    Connection(String),

    /// The health probe failed
    #[error("{error}")]
    Probe { error: String, body: Option<String> },
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) | Self::Connection(_) | Self::Probe { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::Probe { error, body } => ErrorResponse { error, body },
            other => ErrorResponse {
                error: other.to_string(),
                body: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers
pub type AppResult<T> = Result<T, AppError>;

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl From<BridgeError> for AppError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Configuration(e) => Self::from(e),
            BridgeError::Connection(e) => Self::Connection(format!("Failed to connect to live service: {e}")),
        }
    }
}

impl From<ProbeFailure> for AppError {
    fn from(failure: ProbeFailure) -> Self {
        Self::Probe {
            error: failure.error,
            body: failure.body,
        }
    }
}
