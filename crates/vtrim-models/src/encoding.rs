//! Video encoding configuration for trimmed clips.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryslow";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 18;
/// Highest CRF libx264 accepts
pub const MAX_CRF: u8 = 51;
/// Pixel format with the widest player support
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Encoding settings applied to every trim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimEncoding {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "veryslow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Move the moov atom to the front so playback starts before download ends
    #[serde(default = "default_faststart")]
    pub faststart: bool,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_faststart() -> bool {
    true
}

impl Default for TrimEncoding {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            faststart: true,
        }
    }
}

impl TrimEncoding {
    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Convert to FFmpeg output arguments for the given quality.
    pub fn to_ffmpeg_args(&self, crf: u8) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
        ];

        if self.faststart {
            args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        }

        args
    }
}

/// Resolve a client-supplied quality value.
///
/// Numbers in `0..=51` are rounded to the nearest integer. Anything else,
/// including missing values, strings and out-of-range numbers, yields
/// [`DEFAULT_CRF`].
pub fn sanitize_crf(raw: Option<&Value>) -> u8 {
    match raw.and_then(Value::as_f64) {
        Some(crf) if crf.is_finite() && (0.0..=MAX_CRF as f64).contains(&crf) => crf.round() as u8,
        _ => DEFAULT_CRF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = TrimEncoding::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.audio_codec, "aac");
        assert_eq!(config.preset, "veryslow");
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = TrimEncoding::default().to_ffmpeg_args(23);
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-crf 23"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.ends_with("-movflags +faststart"));
    }

    #[test]
    fn test_sanitize_crf_in_range() {
        assert_eq!(sanitize_crf(Some(&json!(0))), 0);
        assert_eq!(sanitize_crf(Some(&json!(28))), 28);
        assert_eq!(sanitize_crf(Some(&json!(51))), 51);
        assert_eq!(sanitize_crf(Some(&json!(22.6))), 23);
    }

    #[test]
    fn test_sanitize_crf_falls_back() {
        assert_eq!(sanitize_crf(None), DEFAULT_CRF);
        assert_eq!(sanitize_crf(Some(&json!(-1))), DEFAULT_CRF);
        assert_eq!(sanitize_crf(Some(&json!(52))), DEFAULT_CRF);
        assert_eq!(sanitize_crf(Some(&json!("20"))), DEFAULT_CRF);
        assert_eq!(sanitize_crf(Some(&Value::Null)), DEFAULT_CRF);
    }
}
