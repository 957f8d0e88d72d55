//! Video upload handler.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::{BoxError, Json};
use futures_util::{Stream, TryStreamExt};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::{info, warn};
use uuid::Uuid;
use vtrim_models::UploadResponse;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying the video.
pub const UPLOAD_FIELD: &str = "videoFile";

/// Store an uploaded video under a random name and return its server path.
///
/// The client-supplied filename is ignored.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let uploads = state.jobs.root().uploads_dir();
    fs::create_dir_all(&uploads)
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let path = uploads.join(format!("{}.mp4", Uuid::new_v4().simple()));
        let partial = PartialFile::new(&path);

        stream_to_file(&path, field)
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;
        partial.keep();

        info!("Stored upload at {}", path.display());
        return Ok(Json(UploadResponse::new(path.display().to_string())));
    }

    Err(ApiError::bad_request("No file"))
}

/// Save a `Stream` to a file.
async fn stream_to_file<S, E>(path: &Path, stream: S) -> io::Result<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures_util::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;

    Ok(())
}

/// Removes the file on drop unless [`PartialFile::keep`] was called, so an
/// upload that fails or is abandoned mid-stream leaves nothing behind.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => warn!("Removed incomplete upload {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove incomplete upload {}: {}", path.display(), e),
            }
        }
    }
}
