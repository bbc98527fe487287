//! Error types and their HTTP mapping

use crate::params::EncodingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ci_gateway::GatewayError;
use panel_common::JobKind;
use thiserror::Error;
use tracing::error;

/// Fatal outcomes of an orchestrator operation.
///
/// Conflicts and malformed CI responses are not errors; see
/// [`crate::orchestrator::TriggerOutcome`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Job kind cannot be triggered: {0}")]
    UnsupportedKind(JobKind),

    #[error("Admin role required")]
    Forbidden,

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Extra fields merged into the JSON body
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.message
        });

        if let (Some(serde_json::Value::Object(extra)), Some(map)) =
            (self.details, body.as_object_mut())
        {
            map.extend(extra);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Internal error: {:#}", err);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let message = err.to_string();
        match err {
            OrchestratorError::NotFound(_) => ApiError::not_found(message),
            OrchestratorError::PreconditionFailed(_) | OrchestratorError::UnsupportedKind(_) => {
                ApiError::bad_request(message)
            }
            OrchestratorError::Encoding(e) => ApiError {
                details: Some(serde_json::json!({ "field": e.field })),
                ..ApiError::bad_request(message)
            },
            OrchestratorError::Forbidden => ApiError::new(StatusCode::FORBIDDEN, message),
            OrchestratorError::Gateway(e) => {
                let upstream = match &e {
                    GatewayError::Http { body, .. } => body.clone(),
                    _ => None,
                };
                ApiError {
                    details: Some(serde_json::json!({
                        "kind": e.kind(),
                        "status_code": e.status_code(),
                        "upstream": upstream,
                    })),
                    ..ApiError::new(StatusCode::BAD_GATEWAY, message)
                }
            }
            OrchestratorError::Storage(e) => ApiError::from(e),
        }
    }
}
