//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::sync::SyncError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Engine error: {0}")]
    Engine(#[from] livesync_engine::Error),

    #[error("Unauthorized")]
    Unauthorized,
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Sync(e) => match e {
                SyncError::UnknownResource(_) => StatusCode::NOT_FOUND,
                SyncError::DuplicateResource(_) => StatusCode::CONFLICT,
                SyncError::Mutation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SyncError::Fetch(_) | SyncError::Feed(_) => StatusCode::BAD_GATEWAY,
                SyncError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Engine(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_message, details) = match &self {
            AppError::Sync(SyncError::Mutation(e)) => {
                ("Mutation rejected".to_string(), Some(e.message.clone()))
            }
            AppError::Sync(e) => {
                if status.is_server_error() {
                    tracing::error!("Sync error: {}", e);
                }
                (e.to_string(), None)
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                (e.to_string(), None)
            }
            AppError::Unauthorized => ("Unauthorized".to_string(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
