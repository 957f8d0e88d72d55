#![deny(unreachable_patterns)]
//! FFmpeg orchestration for timeline previews and trimming.
//!
//! This crate provides:
//! - Path validation against a trusted root
//! - Collision-free artifact naming
//! - Type-safe FFmpeg command building
//! - A process runner with cancellation via `CancellationToken`
//! - Progress parsing from `-progress pipe:2`
//! - Frame extraction and trim jobs

pub mod command;
pub mod error;
pub mod frames;
pub mod jobs;
pub mod naming;
pub mod progress;
pub mod security;
pub mod trim;

pub use command::{check_ffmpeg, FfmpegCommand, ProcessOutcome, ProcessRunner, ToolFailure};
pub use error::{MediaError, MediaResult};
pub use frames::{FrameExtractionJob, FrameParams, FramePreview};
pub use jobs::{JobContext, JobOutcome};
pub use naming::{ArtifactNamer, FrameBatch, ARTIFACT_URL_PREFIX};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use security::{PathValidator, TrustedRoot, VideoRef};
pub use trim::{TrimJob, TrimParams, TrimmedClip};

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::command::ProcessRunner;
    use crate::jobs::JobContext;
    use crate::security::TrustedRoot;

    /// A trusted root with one uploaded source at `uploads/abc123.mp4` and a
    /// separate directory for fake tools.
    pub struct Fixture {
        _dir: TempDir,
        root: TrustedRoot,
        bin: PathBuf,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = TrustedRoot::new(dir.path().join("data"), "/").unwrap();
            std::fs::create_dir_all(root.uploads_dir()).unwrap();
            std::fs::write(root.uploads_dir().join("abc123.mp4"), b"not really a video").unwrap();

            let bin = dir.path().join("bin");
            std::fs::create_dir_all(&bin).unwrap();

            Self {
                _dir: dir,
                root,
                bin,
            }
        }

        pub fn root(&self) -> &TrustedRoot {
            &self.root
        }

        pub fn bin_dir(&self) -> &Path {
            &self.bin
        }

        pub fn video_path(&self) -> String {
            self.root.uploads_dir().join("abc123.mp4").display().to_string()
        }

        pub fn context(&self, ffmpeg: PathBuf) -> Arc<JobContext> {
            Arc::new(JobContext::new(
                self.root.clone(),
                self.root.path(),
                ProcessRunner::new(ffmpeg),
            ))
        }
    }

    /// Write an executable shell script standing in for ffmpeg. It receives
    /// the same arguments ffmpeg would.
    pub fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(format!("ffmpeg-{}", uuid::Uuid::new_v4().simple()));
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
