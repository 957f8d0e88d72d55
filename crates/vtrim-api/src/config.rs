//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use vtrim_models::encoding::DEFAULT_PRESET;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size for JSON routes
    pub max_body_size: usize,
    /// Max upload size
    pub max_upload_size: usize,
    /// Directory all uploads and artifacts live in (may be relative)
    pub trusted_root: PathBuf,
    /// FFmpeg executable; resolved from PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// Kill FFmpeg runs that exceed this; unset means no limit
    pub ffmpeg_timeout: Option<Duration>,
    /// x264 preset for trims
    pub trim_preset: String,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024,               // 1MB
            max_upload_size: 2 * 1024 * 1024 * 1024, // 2GB
            trusted_root: PathBuf::from("data"),
            ffmpeg_path: None,
            ffmpeg_timeout: None,
            trim_preset: DEFAULT_PRESET.to_string(),
            metrics_enabled: true,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_size),
            trusted_root: std::env::var("TRUSTED_ROOT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.trusted_root),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            ffmpeg_timeout: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            trim_preset: std::env::var("TRIM_PRESET")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.trim_preset),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.trim_preset, "veryslow");
        assert!(config.ffmpeg_timeout.is_none());
        assert!(config.metrics_enabled);
        assert!(!config.is_production());
    }
}
