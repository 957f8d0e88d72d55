//! Trim and re-encode a time range of a source video.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vtrim_models::{sanitize_crf, JobKind, JobState, TrimRequest};

use crate::command::{FfmpegCommand, ProcessOutcome};
use crate::error::{MediaError, MediaResult};
use crate::jobs::{remove_partial, JobContext, JobOutcome, JobTracker};
use crate::security::VideoRef;

/// Parameters for one trim.
#[derive(Debug, Clone, Default)]
pub struct TrimParams {
    pub path: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    /// Raw quality value; anything outside 0..=51 falls back to the default
    pub crf: Option<Value>,
}

impl From<TrimRequest> for TrimParams {
    fn from(req: TrimRequest) -> Self {
        Self {
            path: req.path,
            start: req.start,
            end: req.end,
            crf: req.crf,
        }
    }
}

/// A fully written trimmed clip.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedClip {
    pub path: PathBuf,
    pub url: String,
}

/// Produces a re-encoded clip of `[start, end]`.
///
/// The output file exists only if the job completes: on cancellation or
/// tool failure it is removed before the job returns.
pub struct TrimJob {
    ctx: Arc<JobContext>,
    params: TrimParams,
}

impl TrimJob {
    pub fn new(ctx: Arc<JobContext>, params: TrimParams) -> Self {
        Self { ctx, params }
    }

    pub async fn run(self, cancel: &CancellationToken) -> MediaResult<JobOutcome<TrimmedClip>> {
        let mut tracker = JobTracker::new(JobKind::Trim);
        tracker.transition(JobState::Validating);

        let (video, start, end) = tracker.validated(self.validate())?;
        let result = self.trim(&video, start, end, cancel, &tracker).await;
        tracker.finish(result)
    }

    fn validate(&self) -> MediaResult<(VideoRef, f64, f64)> {
        let (start, end) = match (self.params.start, self.params.end) {
            (Some(start), Some(end)) if start.is_finite() && end.is_finite() => (start, end),
            _ => return Err(MediaError::invalid_input("start and end are required")),
        };
        if start < 0.0 {
            return Err(MediaError::invalid_input("start must not be negative"));
        }

        let video = self
            .ctx
            .validator
            .validate(self.params.path.as_deref().unwrap_or_default())?;

        // The plan carries millisecond precision; a range that rounds away is empty
        let (start_ms, end_ms) = (to_millis(start), to_millis(end));
        if end_ms <= start_ms {
            return Err(MediaError::InvalidRange { start, end });
        }

        Ok((video, from_millis(start_ms), from_millis(end_ms)))
    }

    async fn trim(
        &self,
        video: &VideoRef,
        start: f64,
        end: f64,
        cancel: &CancellationToken,
        tracker: &JobTracker,
    ) -> MediaResult<JobOutcome<TrimmedClip>> {
        let output = self.ctx.namer.trim_file(video, start, end).await?;
        let crf = sanitize_crf(self.params.crf.as_ref());

        let cmd = FfmpegCommand::new(video.path(), &output)
            .seek(start)
            .duration(end - start)
            .output_args(self.ctx.encoding.to_ffmpeg_args(crf));

        info!(
            job_id = %tracker.id().short(),
            start,
            end,
            crf,
            "Trimming {} -> {}",
            video.path().display(),
            output.display()
        );

        let started = Instant::now();
        let outcome = self.ctx.runner.run(&cmd, cancel).await;
        tracker.record_tool_run(started.elapsed());

        match outcome {
            ProcessOutcome::Success => {}
            ProcessOutcome::Cancelled => {
                info!(job_id = %tracker.id().short(), "Trim cancelled, removing partial output");
                remove_partial(&output).await;
                return Ok(JobOutcome::Cancelled);
            }
            ProcessOutcome::ToolFailure(failure) => {
                remove_partial(&output).await;
                return Err(failure.into());
            }
        }

        if tokio::fs::metadata(&output).await.is_err() {
            warn!(job_id = %tracker.id().short(), "FFmpeg exited cleanly without output");
            return Err(MediaError::tool_failure("FFmpeg produced no output", None, Some(0)));
        }

        let url = self.ctx.namer.public_url(&output)?;
        info!(job_id = %tracker.id().short(), url = %url, "Trim finished");

        Ok(JobOutcome::Completed(TrimmedClip { path: output, url }))
    }
}

fn to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

fn from_millis(millis: i64) -> f64 {
    millis as f64 / 1000.0
}
