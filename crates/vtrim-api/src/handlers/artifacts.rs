//! Serves generated frames and clips from the trusted root.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Stream an artifact addressed relative to the trusted root.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path(relative): Path<String>,
) -> ApiResult<Response> {
    let path = state.jobs.validator.resolve_artifact(&relative)?;

    let file = File::open(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ApiError::not_found("File not found"),
        _ => ApiError::internal(e.to_string()),
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&path))
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Content type by extension.
pub fn content_type_for(path: &FsPath) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(FsPath::new("frames/a/frame-1-00001.png")), "image/png");
        assert_eq!(content_type_for(FsPath::new("trimmed/a.MP4")), "video/mp4");
        assert_eq!(content_type_for(FsPath::new("notes.txt")), "application/octet-stream");
        assert_eq!(content_type_for(FsPath::new("noext")), "application/octet-stream");
    }
}
