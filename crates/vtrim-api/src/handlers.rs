//! Request handlers.

pub mod artifacts;
pub mod frames;
pub mod health;
pub mod trim;
pub mod upload;

pub use artifacts::*;
pub use frames::*;
pub use health::*;
pub use trim::*;
pub use upload::*;

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use vtrim_media::{JobOutcome, MediaResult};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Run a job on its own task under a request-scoped cancellation token.
///
/// The token is a child of the shutdown token and is cancelled when this
/// future is dropped, which is what happens when the client disconnects.
/// The job task then kills its FFmpeg process and cleans up on its own.
pub(crate) async fn run_job<T, F, Fut>(state: &AppState, job: F) -> ApiResult<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = MediaResult<JobOutcome<T>>> + Send + 'static,
    T: Send + 'static,
{
    let token = state.shutdown.child_token();
    let _guard = token.clone().drop_guard();

    let outcome = tokio::spawn(job(token).in_current_span())
        .await
        .map_err(|e| ApiError::internal(format!("Job task failed: {}", e)))??;

    match outcome {
        JobOutcome::Completed(value) => Ok(value),
        JobOutcome::Cancelled => Err(ApiError::Cancelled),
    }
}
