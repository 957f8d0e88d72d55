//! Request-scoped job plumbing shared by frame extraction and trimming.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use vtrim_models::{JobId, JobKind, JobState, TrimEncoding};

use crate::command::ProcessRunner;
use crate::error::MediaResult;
use crate::naming::ArtifactNamer;
use crate::security::{PathValidator, TrustedRoot};

/// Metric names recorded by jobs.
pub mod names {
    pub const JOBS_TOTAL: &str = "vtrim_jobs_total";
    pub const FFMPEG_DURATION: &str = "vtrim_ffmpeg_duration_seconds";
}

/// Everything a job needs, built once at startup.
///
/// Holds no mutable state, so one context serves any number of concurrent
/// jobs.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub validator: PathValidator,
    pub namer: ArtifactNamer,
    pub runner: ProcessRunner,
    pub encoding: TrimEncoding,
}

impl JobContext {
    pub fn new(root: TrustedRoot, base_dir: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        Self {
            validator: PathValidator::new(root.clone(), base_dir),
            namer: ArtifactNamer::new(root),
            runner,
            encoding: TrimEncoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: TrimEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn root(&self) -> &TrustedRoot {
        self.validator.root()
    }
}

/// How a job ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<T> {
    Completed(T),
    /// The caller's cancellation token fired; there is no result
    Cancelled,
}

impl<T> JobOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            JobOutcome::Completed(value) => Some(value),
            JobOutcome::Cancelled => None,
        }
    }
}

/// Lifecycle bookkeeping for one job: logs transitions and records metrics.
#[derive(Debug)]
pub(crate) struct JobTracker {
    id: JobId,
    kind: JobKind,
    state: JobState,
    created: Instant,
}

impl JobTracker {
    pub(crate) fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            state: JobState::Created,
            created: Instant::now(),
        }
    }

    pub(crate) fn id(&self) -> &JobId {
        &self.id
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            warn!(
                job_id = %self.id.short(),
                kind = %self.kind,
                "Unexpected job transition {} -> {}",
                self.state,
                next
            );
        }

        debug!(
            job_id = %self.id.short(),
            kind = %self.kind,
            from = %self.state,
            to = %next,
            "Job state changed"
        );
        self.state = next;

        if next.is_terminal() {
            metrics::counter!(
                names::JOBS_TOTAL,
                "kind" => self.kind.as_str(),
                "state" => next.as_str()
            )
            .increment(1);
            debug!(
                job_id = %self.id.short(),
                elapsed_ms = self.created.elapsed().as_millis() as u64,
                "Job finished"
            );
        }
    }

    /// Move out of `Validating` after input checks.
    pub(crate) fn validated<T>(&mut self, result: MediaResult<T>) -> MediaResult<T> {
        match result {
            Ok(value) => {
                self.transition(JobState::Running);
                Ok(value)
            }
            Err(e) => {
                debug!(job_id = %self.id.short(), "Job rejected: {}", e);
                self.transition(JobState::Rejected);
                Err(e)
            }
        }
    }

    /// Record the terminal state of a running job.
    pub(crate) fn finish<T>(
        &mut self,
        result: MediaResult<JobOutcome<T>>,
    ) -> MediaResult<JobOutcome<T>> {
        let next = match &result {
            Ok(JobOutcome::Completed(_)) => JobState::Completed,
            Ok(JobOutcome::Cancelled) => JobState::Cancelled,
            Err(_) => JobState::ToolFailed,
        };
        self.transition(next);
        result
    }

    pub(crate) fn record_tool_run(&self, elapsed: Duration) {
        metrics::histogram!(names::FFMPEG_DURATION, "kind" => self.kind.as_str())
            .record(elapsed.as_secs_f64());
    }
}

/// Remove a file that must not be published; a missing file is fine.
pub(crate) async fn remove_partial(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    #[test]
    fn test_tracker_success_path() {
        let mut tracker = JobTracker::new(JobKind::Trim);
        assert_eq!(tracker.state(), JobState::Created);
        assert_eq!(tracker.id().as_str().len(), 32);

        tracker.transition(JobState::Validating);
        tracker.validated(Ok(())).unwrap();
        assert_eq!(tracker.state(), JobState::Running);

        let result = tracker.finish::<u8>(Ok(JobOutcome::Completed(1)));
        assert_eq!(result.unwrap(), JobOutcome::Completed(1));
        assert_eq!(tracker.state(), JobState::Completed);
    }

    #[test]
    fn test_tracker_rejection_and_failure() {
        let mut tracker = JobTracker::new(JobKind::Frames);
        tracker.transition(JobState::Validating);
        let err = tracker
            .validated::<()>(Err(MediaError::invalid_input("missing path")))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(tracker.state(), JobState::Rejected);

        let mut tracker = JobTracker::new(JobKind::Frames);
        tracker.transition(JobState::Validating);
        tracker.validated(Ok(())).unwrap();
        let _ = tracker.finish::<()>(Err(MediaError::tool_failure("boom", None, Some(1))));
        assert_eq!(tracker.state(), JobState::ToolFailed);
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(JobOutcome::<u8>::Cancelled.is_cancelled());
        assert_eq!(JobOutcome::Completed(3).completed(), Some(3));
        assert_eq!(JobOutcome::<u8>::Cancelled.completed(), None);
    }

    #[tokio::test]
    async fn test_remove_partial_ignores_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("partial.mp4");
        remove_partial(&file).await;

        std::fs::write(&file, b"half").unwrap();
        remove_partial(&file).await;
        assert!(!file.exists());
    }
}
