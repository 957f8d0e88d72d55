//! FFmpeg progress parsing.
//!
//! Progress is advisory telemetry: it is logged and forwarded to callbacks
//! but never changes how a run settles.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Minimum wall time between progress log lines.
pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> Option<f64> {
        if total_duration_ms <= 0 {
            return None;
        }
        Some(((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0))
    }

    /// Timemark suitable for logs, if FFmpeg reported one.
    pub fn timemark(&self) -> Option<&str> {
        let mark = self.out_time.trim();
        if mark.is_empty() || mark == "N/A" {
            None
        } else {
            Some(mark)
        }
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(&FfmpegProgress) + Send + 'static>;

/// Outcome of feeding one stderr line to [`ProgressParser`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    /// A `progress=` key closed a block; carries the accumulated snapshot
    Block(FfmpegProgress),
    /// A recognised key=value that did not close a block
    Field,
    /// Not part of `-progress` output (diagnostics, warnings)
    Other,
}

/// Accumulates `-progress pipe:2` key/value lines into snapshots.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a progress line from FFmpeg's -progress output.
    pub fn feed(&mut self, line: &str) -> ProgressLine {
        let line = line.trim();

        let Some((key, value)) = line.split_once('=') else {
            return ProgressLine::Other;
        };

        match key {
            "out_time_ms" | "out_time_us" => {
                // FFmpeg reports microseconds under both keys
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            "out_time" => {
                self.current.out_time = value.to_string();
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.current.fps = fps;
                }
            }
            "speed" => {
                if let Some(speed) = value.trim().strip_suffix('x').and_then(|s| s.parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.current.is_complete = true;
                }
                return ProgressLine::Block(self.current.clone());
            }
            "bitrate" | "total_size" | "dup_frames" | "drop_frames" | "stream_0_0_q" => {}
            _ => return ProgressLine::Other,
        }

        ProgressLine::Field
    }
}

/// Rate limiter for progress log lines.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Returns true at most once per interval; the first call always passes.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(PROGRESS_LOG_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_parsing() {
        let mut parser = ProgressParser::new();

        assert_eq!(parser.feed("frame=42"), ProgressLine::Field);
        assert_eq!(parser.feed("out_time_us=5000000"), ProgressLine::Field);
        assert_eq!(parser.feed("out_time=00:00:05.000000"), ProgressLine::Field);
        assert_eq!(parser.feed("speed=1.5x"), ProgressLine::Field);

        match parser.feed("progress=continue") {
            ProgressLine::Block(p) => {
                assert_eq!(p.frame, 42);
                assert_eq!(p.out_time_ms, 5000);
                assert!((p.speed - 1.5).abs() < 0.01);
                assert!(!p.is_complete);
                assert_eq!(p.timemark(), Some("00:00:05.000000"));
            }
            other => panic!("expected block, got {:?}", other),
        }

        match parser.feed("progress=end") {
            ProgressLine::Block(p) => assert!(p.is_complete),
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_diagnostics_are_other() {
        let mut parser = ProgressParser::new();
        assert_eq!(
            parser.feed("Error opening input file /data/uploads/x.mp4."),
            ProgressLine::Other
        );
        assert_eq!(parser.feed("speed=N/A"), ProgressLine::Field);
        assert_eq!(parser.feed("[libx264 @ 0x1] crf=18.0 qcomp=0.60"), ProgressLine::Other);
    }

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000).unwrap() - 50.0).abs() < 0.01);
        assert!((progress.percentage(2500).unwrap() - 100.0).abs() < 0.01);
        assert!(progress.percentage(0).is_none());
        assert!(progress.timemark().is_none());
    }

    #[test]
    fn test_log_throttle() {
        let mut throttle = LogThrottle::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert!(throttle.ready(t0));
        assert!(!throttle.ready(t0 + Duration::from_millis(500)));
        assert!(throttle.ready(t0 + Duration::from_millis(1000)));
        assert!(!throttle.ready(t0 + Duration::from_millis(1999)));
    }
}
