//! Timeline frame extraction.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vtrim_models::frames::{
    effective_fps, frame_timestamps, DEFAULT_FPS, DEFAULT_FRAME_WIDTH, MAX_FPS, MAX_FRAME_WIDTH,
    MIN_FRAME_WIDTH,
};
use vtrim_models::{FrameEntry, FramesRequest, JobKind, JobState};

use crate::command::{FfmpegCommand, ProcessOutcome};
use crate::error::{MediaError, MediaResult};
use crate::jobs::{JobContext, JobOutcome, JobTracker};
use crate::naming::FrameBatch;
use crate::security::VideoRef;

/// Parameters for one extraction.
#[derive(Debug, Clone, Default)]
pub struct FrameParams {
    pub path: Option<String>,
    pub fps: Option<f64>,
    pub frame_width: Option<u32>,
    /// Source duration in seconds as known by the caller
    pub duration: Option<f64>,
}

impl From<FramesRequest> for FrameParams {
    fn from(req: FramesRequest) -> Self {
        Self {
            path: req.path,
            fps: req.fps,
            frame_width: req.frame_width,
            duration: req.duration,
        }
    }
}

/// Frames produced by a completed extraction, in generation order.
#[derive(Debug, Clone)]
pub struct FramePreview {
    pub dir: PathBuf,
    pub frames: Vec<FrameEntry>,
}

/// Validated sampling settings.
#[derive(Debug, Clone, Copy)]
struct Sampling {
    fps: f64,
    width: u32,
    duration: Option<f64>,
}

impl Sampling {
    fn filter(&self) -> String {
        format!("fps={},scale={}:-1", self.fps, self.width)
    }
}

/// Samples still frames from a source video into its frame directory.
///
/// Frames already written when the job is cancelled stay on disk. Each run
/// writes under its own file prefix, so they never show up in another run's
/// listing.
pub struct FrameExtractionJob {
    ctx: Arc<JobContext>,
    params: FrameParams,
}

impl FrameExtractionJob {
    pub fn new(ctx: Arc<JobContext>, params: FrameParams) -> Self {
        Self { ctx, params }
    }

    pub async fn run(self, cancel: &CancellationToken) -> MediaResult<JobOutcome<FramePreview>> {
        let mut tracker = JobTracker::new(JobKind::Frames);
        tracker.transition(JobState::Validating);

        let (video, sampling) = tracker.validated(self.validate())?;
        let result = self.extract(&video, sampling, cancel, &tracker).await;
        tracker.finish(result)
    }

    fn validate(&self) -> MediaResult<(VideoRef, Sampling)> {
        let video = self
            .ctx
            .validator
            .validate(self.params.path.as_deref().unwrap_or_default())?;

        let fps = self.params.fps.unwrap_or(DEFAULT_FPS);
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MediaError::invalid_input("fps must be a positive number"));
        }
        if fps > MAX_FPS {
            return Err(MediaError::invalid_input(format!(
                "fps must not exceed {}",
                MAX_FPS
            )));
        }

        let width = self.params.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH);
        if !(MIN_FRAME_WIDTH..=MAX_FRAME_WIDTH).contains(&width) {
            return Err(MediaError::invalid_input(format!(
                "frameWidth must be between {} and {}",
                MIN_FRAME_WIDTH, MAX_FRAME_WIDTH
            )));
        }

        let duration = self.params.duration.filter(|d| d.is_finite() && *d > 0.0);

        Ok((
            video,
            Sampling {
                fps: effective_fps(fps, duration),
                width,
                duration,
            },
        ))
    }

    async fn extract(
        &self,
        video: &VideoRef,
        sampling: Sampling,
        cancel: &CancellationToken,
        tracker: &JobTracker,
    ) -> MediaResult<JobOutcome<FramePreview>> {
        let batch = self.ctx.namer.frame_batch(video).await?;

        let mut cmd = FfmpegCommand::new(video.path(), batch.output_pattern())
            .video_filter(sampling.filter())
            .variable_frame_rate();
        if let Some(duration) = sampling.duration {
            cmd = cmd.expect_duration(duration);
        }

        info!(
            job_id = %tracker.id().short(),
            fps = sampling.fps,
            width = sampling.width,
            "Extracting frames from {}",
            video.path().display()
        );

        let started = Instant::now();
        let outcome = self.ctx.runner.run(&cmd, cancel).await;
        tracker.record_tool_run(started.elapsed());

        match outcome {
            ProcessOutcome::Success => {}
            ProcessOutcome::Cancelled => {
                info!(
                    job_id = %tracker.id().short(),
                    "Frame extraction cancelled, leaving written frames in {}",
                    batch.dir().display()
                );
                return Ok(JobOutcome::Cancelled);
            }
            ProcessOutcome::ToolFailure(failure) => return Err(failure.into()),
        }

        let names = list_batch(&batch).await?;
        let duration = sampling
            .duration
            .unwrap_or(names.len() as f64 / sampling.fps);

        let frames = names
            .iter()
            .zip(frame_timestamps(names.len(), duration))
            .map(|(name, time)| {
                Ok(FrameEntry {
                    time,
                    url: self.ctx.namer.public_url(&batch.dir().join(name))?,
                })
            })
            .collect::<MediaResult<Vec<_>>>()?;

        info!(
            job_id = %tracker.id().short(),
            count = frames.len(),
            "Frame extraction finished"
        );

        Ok(JobOutcome::Completed(FramePreview {
            dir: batch.dir().to_path_buf(),
            frames,
        }))
    }
}

/// File names written by `batch`, sorted by frame index.
async fn list_batch(batch: &FrameBatch) -> MediaResult<Vec<String>> {
    let mut entries = fs::read_dir(batch.dir()).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if batch.owns(name) {
                names.push(name.to_string());
            }
        }
    }

    // Zero-padded indices make lexical order generation order
    names.sort();
    Ok(names)
}
