use serde::Serialize;
use thiserror::Error;

/// Failure talking to the CI server
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("CI request timed out")]
    Timeout,

    #[error("CI server returned HTTP {status}")]
    Http {
        status: u16,
        body: Option<serde_json::Value>,
    },

    #[error("Failed to connect to CI server: {0}")]
    ConnectionFailure(String),

    #[error("CI request failed: {0}")]
    Unknown(String),
}

/// Coarse classification of a [`GatewayError`], for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    Timeout,
    HttpError,
    ConnectionFailure,
    Unknown,
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            GatewayError::Timeout => GatewayErrorKind::Timeout,
            GatewayError::Http { .. } => GatewayErrorKind::HttpError,
            GatewayError::ConnectionFailure(_) => GatewayErrorKind::ConnectionFailure,
            GatewayError::Unknown(_) => GatewayErrorKind::Unknown,
        }
    }

    /// Upstream HTTP status, if the CI server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_connect() {
            GatewayError::ConnectionFailure(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Http {
                status: status.as_u16(),
                body: None,
            }
        } else {
            GatewayError::Unknown(err.to_string())
        }
    }
}
