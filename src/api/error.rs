use crate::error::{ErrorKind, MediaError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Upload rejected by validation; the body lists what would have been accepted
    #[error("Rejected: {message}")]
    Rejected {
        message: String,
        allowed_types: Vec<String>,
    },

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Media(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Range => StatusCode::BAD_REQUEST,
                ErrorKind::StorageIo | ErrorKind::Transform | ErrorKind::Database => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Media(MediaError::Database(e)) => {
                tracing::error!("Database error: {:?}", e);
                json!({ "error": "Internal Server Error", "kind": ErrorKind::Database })
            }
            AppError::Media(e) => {
                if status.is_server_error() {
                    tracing::error!("Internal error: {}", e);
                }
                json!({ "error": e.to_string(), "kind": e.kind() })
            }
            AppError::Rejected {
                message,
                allowed_types,
            } => json!({
                "error": message,
                "kind": ErrorKind::Validation,
                "allowed_types": allowed_types,
            }),
            AppError::BadRequest(msg) | AppError::PayloadTooLarge(msg) => {
                json!({ "error": msg })
            }
        };

        (status, Json(body)).into_response()
    }
}
