//! Application state.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vtrim_media::{JobContext, MediaResult, ProcessRunner, TrustedRoot};
use vtrim_models::TrimEncoding;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: Arc<JobContext>,
    /// Parent of every job's cancellation token; cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create new application state.
    ///
    /// `base_dir` is the working directory captured at startup; a relative
    /// trusted root and relative client paths resolve against it.
    pub fn new(config: ApiConfig, base_dir: &Path) -> MediaResult<Self> {
        let root = TrustedRoot::new(&config.trusted_root, base_dir)?;
        for dir in [root.uploads_dir(), root.frames_dir(), root.trimmed_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        info!("Trusted root: {}", root.path().display());

        let runner = match &config.ffmpeg_path {
            Some(path) => ProcessRunner::new(path),
            None => ProcessRunner::from_path().unwrap_or_else(|e| {
                warn!("{}; falling back to `ffmpeg`", e);
                ProcessRunner::new("ffmpeg")
            }),
        };
        let runner = match config.ffmpeg_timeout {
            Some(timeout) => runner.with_timeout(timeout),
            None => runner,
        };
        info!(
            timeout_secs = ?runner.timeout().map(|t| t.as_secs()),
            "Using FFmpeg at {}",
            runner.binary().display()
        );

        let jobs = JobContext::new(root, base_dir, runner)
            .with_encoding(TrimEncoding::default().with_preset(config.trim_preset.clone()));

        Ok(Self::from_parts(config, jobs))
    }

    /// Assemble state from an already built job context.
    pub fn from_parts(config: ApiConfig, jobs: JobContext) -> Self {
        Self {
            config,
            jobs: Arc::new(jobs),
            shutdown: CancellationToken::new(),
        }
    }
}
