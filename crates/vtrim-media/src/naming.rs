//! Output locations for generated artifacts.
//!
//! Names are derived from the source stem plus operation parameters. They
//! are not content-addressed: running the same operation twice produces new
//! files rather than reusing old ones.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};
use crate::security::{TrustedRoot, VideoRef};

/// URL prefix under which the artifact route serves files from the root.
pub const ARTIFACT_URL_PREFIX: &str = "/artifacts";
/// File prefix shared by every extracted frame.
pub const FRAME_FILE_PREFIX: &str = "frame-";

/// File naming for one frame extraction run.
///
/// Runs against the same source share a per-video directory; the batch
/// prefix keeps their files apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBatch {
    dir: PathBuf,
    prefix: String,
}

impl FrameBatch {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// FFmpeg image2 output pattern (`frame-<batch>-00001.png`, ...).
    pub fn output_pattern(&self) -> PathBuf {
        self.dir.join(format!("{}%05d.png", self.prefix))
    }

    /// Whether `file_name` was written by this batch.
    pub fn owns(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix) && file_name.ends_with(".png")
    }
}

/// Derives collision-resistant artifact paths under the trusted root.
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    root: TrustedRoot,
}

impl ArtifactNamer {
    pub fn new(root: TrustedRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TrustedRoot {
        &self.root
    }

    /// Directory dedicated to frames of `video`; created if absent.
    pub async fn frame_dir(&self, video: &VideoRef) -> MediaResult<PathBuf> {
        let dir = self.root.frames_dir().join(artifact_id(video));
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Frame directory plus a fresh per-run file prefix.
    pub async fn frame_batch(&self, video: &VideoRef) -> MediaResult<FrameBatch> {
        let dir = self.frame_dir(video).await?;
        Ok(FrameBatch {
            dir,
            prefix: format!("{}{}-", FRAME_FILE_PREFIX, short_token()),
        })
    }

    /// Unique output file for a trim of `video` over `[start, end]`.
    ///
    /// Combines the source stem, wall-clock millis, a random token and the
    /// range, so concurrent identical trims never share a path.
    pub async fn trim_file(&self, video: &VideoRef, start: f64, end: f64) -> MediaResult<PathBuf> {
        let dir = self.root.trimmed_dir();
        fs::create_dir_all(&dir).await?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        Ok(dir.join(format!(
            "{}-{}-{}-{}-{}.mp4",
            artifact_id(video),
            millis,
            short_token(),
            format_secs(start),
            format_secs(end)
        )))
    }

    /// Public URL for an artifact written under the root.
    pub fn public_url(&self, artifact: &Path) -> MediaResult<String> {
        let relative = self
            .root
            .relative(artifact)
            .ok_or_else(|| MediaError::AccessDenied(artifact.to_path_buf()))?;

        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        Ok(format!("{}/{}", ARTIFACT_URL_PREFIX, segments.join("/")))
    }
}

/// Identifier derived from the source stem, restricted to filename-safe characters.
fn artifact_id(video: &VideoRef) -> String {
    let id: String = video
        .stem()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if id.is_empty() {
        "video".to_string()
    } else {
        id
    }
}

fn short_token() -> String {
    let token = Uuid::new_v4().simple().to_string();
    token[..8].to_string()
}

/// Seconds formatted for filenames: integers stay bare, fractions keep up to
/// three decimals with the dot replaced (`12.5` -> `12_5`).
fn format_secs(secs: f64) -> String {
    let formatted = format!("{:.3}", secs);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    trimmed.replace('.', "_")
}
