//! Timeline frame preview handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;
use vtrim_media::FrameExtractionJob;
use vtrim_models::{FramesRequest, FramesResponse};

use crate::error::{ApiError, ApiResult};
use crate::handlers::run_job;
use crate::state::AppState;

/// Extract timeline thumbnails for an uploaded video.
pub async fn frames_preview(
    State(state): State<AppState>,
    payload: Result<Json<FramesRequest>, JsonRejection>,
) -> ApiResult<Json<FramesResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    info!(
        fps = ?request.fps,
        frame_width = ?request.frame_width,
        duration = ?request.duration,
        "Frame preview requested"
    );

    let job = FrameExtractionJob::new(Arc::clone(&state.jobs), request.into());
    let preview = run_job(&state, |token| async move { job.run(&token).await }).await?;

    Ok(Json(FramesResponse::new(preview.frames)))
}
