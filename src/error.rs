//! Error types for the boleto extraction server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::extract::ExtractError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Download(msg) => (
                StatusCode::BAD_GATEWAY,
                "download_failed",
                format!("Erro ao baixar PDF: {}", msg),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Extract(e) => match e {
                ExtractError::Document(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_document", msg.clone())
                }
                ExtractError::Timeout(ms) => (
                    StatusCode::REQUEST_TIMEOUT,
                    "timeout",
                    format!("Extraction did not finish within {}ms", ms),
                ),
                ExtractError::QueueTimeout(ms) => (
                    StatusCode::REQUEST_TIMEOUT,
                    "queue_timeout",
                    format!("No extraction slot became free within {}ms", ms),
                ),
                ExtractError::WorkerCrash(msg) => {
                    tracing::error!("Worker crash: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "worker_crash",
                        "Extraction worker failed".to_string(),
                    )
                }
                ExtractError::PoolClosed => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "shutting_down",
                    "Server is shutting down".to_string(),
                ),
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
