//! Trim handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;
use vtrim_media::TrimJob;
use vtrim_models::{TrimRequest, TrimResponse};

use crate::error::{ApiError, ApiResult};
use crate::handlers::run_job;
use crate::state::AppState;

/// Trim and re-encode a range of an uploaded video.
pub async fn trim_video(
    State(state): State<AppState>,
    payload: Result<Json<TrimRequest>, JsonRejection>,
) -> ApiResult<Json<TrimResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    info!(start = ?request.start, end = ?request.end, "Trim requested");

    let job = TrimJob::new(Arc::clone(&state.jobs), request.into());
    let clip = run_job(&state, |token| async move { job.run(&token).await }).await?;

    Ok(Json(TrimResponse::new(clip.url)))
}
