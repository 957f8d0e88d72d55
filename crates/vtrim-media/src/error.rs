//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while validating input or running a job.
///
/// Cancellation is not an error; jobs report it through
/// [`JobOutcome::Cancelled`](crate::jobs::JobOutcome::Cancelled).
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Access outside trusted directory")]
    AccessDenied(PathBuf),

    #[error("File not found")]
    NotFound(PathBuf),

    #[error("Invalid file type: {0}")]
    UnsupportedType(String),

    #[error("Invalid trim range: start={start}, end={end}")]
    InvalidRange { start: f64, end: f64 },

    #[error("FFmpeg command failed: {message}")]
    ToolFailure {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn tool_failure(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolFailure {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Whether the error describes caller-supplied input and is safe to show.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MediaError::InvalidInput(_)
                | MediaError::AccessDenied(_)
                | MediaError::NotFound(_)
                | MediaError::UnsupportedType(_)
                | MediaError::InvalidRange { .. }
        )
    }
}
