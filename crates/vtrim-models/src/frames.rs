//! Timeline thumbnail models.

use serde::{Deserialize, Serialize};

/// Default sampling rate in frames per second.
pub const DEFAULT_FPS: f64 = 3.0;
/// Default thumbnail width in pixels (height follows aspect ratio).
pub const DEFAULT_FRAME_WIDTH: u32 = 120;
/// Narrowest thumbnail we will render.
pub const MIN_FRAME_WIDTH: u32 = 16;
/// Widest thumbnail we will render.
pub const MAX_FRAME_WIDTH: u32 = 1920;
/// Highest sampling rate a caller may request.
pub const MAX_FPS: f64 = 30.0;
/// Upper bound on frames per extraction for long videos.
pub const MAX_PREVIEW_FRAMES: f64 = 300.0;

/// Request body for `POST /api/frames-preview`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramesRequest {
    /// Server-side path returned by the upload endpoint
    #[serde(default, alias = "filePath")]
    pub path: Option<String>,
    /// Requested sampling rate
    #[serde(default)]
    pub fps: Option<f64>,
    /// Thumbnail width in pixels
    #[serde(default)]
    pub frame_width: Option<u32>,
    /// Video duration in seconds, as known by the client
    #[serde(default)]
    pub duration: Option<f64>,
}

/// One thumbnail on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    /// Nominal timestamp in seconds
    pub time: f64,
    /// Public URL of the image
    pub url: String,
}

/// Response body for `POST /api/frames-preview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramesResponse {
    pub success: bool,
    pub frames: Vec<FrameEntry>,
}

impl FramesResponse {
    pub fn new(frames: Vec<FrameEntry>) -> Self {
        Self {
            success: true,
            frames,
        }
    }
}

/// Sampling rate actually used for extraction.
///
/// Bounded by the requested rate and, when the duration is known, by
/// `MAX_PREVIEW_FRAMES / duration` so long videos stay within the frame cap.
pub fn effective_fps(requested: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d.is_finite() && d > 0.0 => requested.min(MAX_PREVIEW_FRAMES / d),
        _ => requested,
    }
}

/// Nominal timestamps for `count` frames spread over `duration` seconds.
///
/// Frame `i` (1-indexed) sits at `i * duration / count`.
pub fn frame_timestamps(count: usize, duration: f64) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    (1..=count)
        .map(|i| i as f64 * duration / count as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_file_path_alias() {
        let req: FramesRequest =
            serde_json::from_str(r#"{"filePath":"/data/uploads/a.mp4","fps":2,"frameWidth":90}"#)
                .unwrap();
        assert_eq!(req.path.as_deref(), Some("/data/uploads/a.mp4"));
        assert_eq!(req.fps, Some(2.0));
        assert_eq!(req.frame_width, Some(90));
        assert!(req.duration.is_none());
    }

    #[test]
    fn test_effective_fps_caps_long_videos() {
        assert_eq!(effective_fps(3.0, Some(9.0)), 3.0);
        assert_eq!(effective_fps(3.0, None), 3.0);
        // 1 hour: 300 frames max -> 1 frame every 12 s
        let fps = effective_fps(3.0, Some(3600.0));
        assert!((fps - 300.0 / 3600.0).abs() < 1e-12);
        assert_eq!(effective_fps(3.0, Some(0.0)), 3.0);
    }

    #[test]
    fn test_frame_timestamps() {
        let times = frame_timestamps(27, 9.0);
        assert_eq!(times.len(), 27);
        assert!((times[0] - 1.0 / 3.0).abs() < 1e-9);
        assert!((times[26] - 9.0).abs() < 1e-9);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert!(frame_timestamps(0, 9.0).is_empty());
    }
}
