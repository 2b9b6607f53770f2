use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::report::store::StoreError;
use crate::report::ErrorKind;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Report generation failed: {message}")]
    Generation { kind: ErrorKind, message: String },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => AppError::NotFound(format!("Report '{name}' not found")),
            StoreError::InvalidName(e) => AppError::Generation {
                kind: ErrorKind::InvalidFilename,
                message: e.to_string(),
            },
            other => AppError::Generation {
                kind: ErrorKind::FilesystemFailure,
                message: other.to_string(),
            },
        }
    }
}

/// HTTP status for each generation failure kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::BackendUnreachable
        | ErrorKind::BackendRejected
        | ErrorKind::BackendMalformedResponse
        | ErrorKind::EmptyContent => StatusCode::BAD_GATEWAY,
        ErrorKind::InvalidFilename => StatusCode::BAD_REQUEST,
        ErrorKind::RenderFailure | ErrorKind::FilesystemFailure => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Generation { kind, message } => {
                let status = status_for(*kind);
                if status.is_server_error() {
                    tracing::error!(code = kind.code(), "Report generation error: {message}");
                }
                (status, kind.code(), message.clone())
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
            "status": "error",
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
