//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use vtrim_media::MediaError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Non-standard status for a request the client abandoned (nginx convention).
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Client closed request")]
    Cancelled,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Processing(_) | ApiError::Upload(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Cancelled => {
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }

    /// Message safe to show to clients. Server-side detail stays in the logs.
    fn public_detail(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Processing(_) => "Processing failed".to_string(),
            ApiError::Upload(_) => "Upload failed".to_string(),
            ApiError::Internal(_) => "An internal error occurred".to_string(),
            ApiError::Cancelled => String::new(),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidInput(msg) => ApiError::BadRequest(msg),
            MediaError::AccessDenied(_)
            | MediaError::UnsupportedType(_)
            | MediaError::InvalidRange { .. } => ApiError::BadRequest(err.to_string()),
            MediaError::NotFound(_) => ApiError::NotFound(err.to_string()),
            MediaError::ToolFailure {
                message,
                stderr,
                exit_code,
            } => {
                error!(
                    exit_code = ?exit_code,
                    stderr = stderr.as_deref().unwrap_or(""),
                    "FFmpeg failed: {}",
                    message
                );
                ApiError::Processing(message)
            }
            MediaError::Io(e) => ApiError::Processing(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ApiError::Cancelled => {
                info!("Request cancelled by client");
                return status.into_response();
            }
            ApiError::Processing(_) | ApiError::Upload(_) | ApiError::Internal(_) => {
                error!("{}", self);
            }
            _ => {}
        }

        let body = ErrorResponse {
            detail: self.public_detail(),
        };

        (status, Json(body)).into_response()
    }
}
