use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::layout::PipelineError;
use crate::oracle::OracleError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Render oracle timed out")]
    OracleTimeout,

    #[error("Render service unavailable: {0}")]
    OracleUnavailable(String),

    #[error("No card renderer configured")]
    RendererNotConfigured,

    #[error("Pagination invariant violated: {0}")]
    Invariant(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::OracleTimeout => AppError::OracleTimeout,
            PipelineError::OracleUnavailable(msg) => AppError::OracleUnavailable(msg),
            err @ PipelineError::InvariantViolation { .. } => AppError::Invariant(err.to_string()),
        }
    }
}

impl From<OracleError> for AppError {
    fn from(err: OracleError) -> Self {
        PipelineError::from(err).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::OracleTimeout => {
                tracing::error!("Render oracle timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "ORACLE_TIMEOUT",
                    "The render service timed out".to_string(),
                )
            }
            AppError::OracleUnavailable(msg) => {
                tracing::error!("Render service unavailable: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "ORACLE_UNAVAILABLE",
                    "The render service is unavailable".to_string(),
                )
            }
            AppError::RendererNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "RENDERER_NOT_CONFIGURED",
                "Set RENDERER_URL to enable image rendering".to_string(),
            ),
            AppError::Invariant(msg) => {
                tracing::error!("Invariant violation: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INVARIANT_VIOLATION",
                    "Pagination lost content; this is a bug".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
