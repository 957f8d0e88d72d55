//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{FfmpegProgress, LogThrottle, ProgressCallback, ProgressLine, ProgressParser};

/// Keep only the last N bytes of diagnostics to avoid unbounded memory growth.
const MAX_STDERR_BYTES: usize = 64 * 1024;
/// How long to wait for the stderr reader after the process has settled.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Builder for FFmpeg commands.
///
/// This is the full plan for one invocation: input, output and every
/// option flag. Nothing else is passed to the tool.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path or image pattern
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
    /// Expected output duration, used only for progress percentages
    expected_duration_ms: Option<i64>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
            expected_duration_ms: None,
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Limit the amount of input read, and so the output duration.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.expected_duration_ms = Some((seconds * 1000.0) as i64);
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Emit frames only when their timestamp changes instead of duplicating.
    pub fn variable_frame_rate(self) -> Self {
        self.output_arg("-vsync").output_arg("vfr")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Hint the total output duration so progress can be reported as a percentage.
    pub fn expect_duration(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            self.expected_duration_ms = Some((seconds * 1000.0) as i64);
        }
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Machine-readable progress on stderr instead of the status line
        args.push("-nostats".to_string());
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Details of an abnormal tool run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub message: String,
    pub exit_code: Option<i32>,
    /// Tail of the tool's diagnostic output
    pub stderr: Option<String>,
}

impl From<ToolFailure> for MediaError {
    fn from(failure: ToolFailure) -> Self {
        MediaError::tool_failure(failure.message, failure.stderr, failure.exit_code)
    }
}

/// Terminal result of one subprocess invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Success,
    ToolFailure(ToolFailure),
    Cancelled,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessOutcome::Cancelled)
    }
}

/// How the wait on the child ended.
enum Settled {
    Exited(ExitStatus),
    Cancelled,
    TimedOut(Duration),
    WaitFailed(std::io::Error),
}

/// Spawns and supervises one FFmpeg process per call.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Executable to invoke
    binary: PathBuf,
    /// Watchdog; `None` lets a run last as long as the caller waits
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Create a runner for an explicit executable.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Create a runner for the `ffmpeg` found on `PATH`.
    pub fn from_path() -> MediaResult<Self> {
        Ok(Self::new(check_ffmpeg()?))
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand, cancel: &CancellationToken) -> ProcessOutcome {
        self.execute(cmd.build_args(), cmd.expected_duration_ms, cancel, None)
            .await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        cancel: &CancellationToken,
        progress_callback: F,
    ) -> ProcessOutcome
    where
        F: Fn(&FfmpegProgress) + Send + 'static,
    {
        self.execute(
            cmd.build_args(),
            cmd.expected_duration_ms,
            cancel,
            Some(Box::new(progress_callback)),
        )
        .await
    }

    /// Run the executable with a raw argument list.
    pub async fn run_args(&self, args: Vec<String>, cancel: &CancellationToken) -> ProcessOutcome {
        self.execute(args, None, cancel, None).await
    }

    async fn execute(
        &self,
        args: Vec<String>,
        expected_duration_ms: Option<i64>,
        cancel: &CancellationToken,
        progress_callback: Option<ProgressCallback>,
    ) -> ProcessOutcome {
        // A cancellation that arrived before spawn still wins
        if cancel.is_cancelled() {
            info!("FFmpeg cancelled before spawn");
            return ProcessOutcome::Cancelled;
        }

        debug!("Running FFmpeg: {} {}", self.binary.display(), args.join(" "));

        let spawned = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", self.binary.display(), e);
                return ProcessOutcome::ToolFailure(ToolFailure {
                    message: format!("Failed to spawn {}: {}", self.binary.display(), e),
                    exit_code: None,
                    stderr: None,
                });
            }
        };

        let started = Instant::now();
        let reader = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_stderr(stderr, expected_duration_ms, progress_callback)));

        let settled = self.wait_for_completion(&mut child, cancel).await;

        let diagnostics = match reader {
            Some(mut handle) => match tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut handle).await {
                Ok(Ok(tail)) => tail,
                Ok(Err(e)) => {
                    warn!("FFmpeg stderr reader failed: {}", e);
                    String::new()
                }
                Err(_) => {
                    handle.abort();
                    String::new()
                }
            },
            None => String::new(),
        };
        let stderr = if diagnostics.trim().is_empty() {
            None
        } else {
            Some(diagnostics)
        };

        match settled {
            Settled::Exited(status) if status.success() => {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "FFmpeg finished");
                ProcessOutcome::Success
            }
            Settled::Exited(status) => {
                let preview = stderr
                    .as_deref()
                    .map(|s| s.lines().rev().take(3).collect::<Vec<_>>().join("; "))
                    .unwrap_or_default();
                warn!(code = ?status.code(), "FFmpeg failed: {}", preview);
                ProcessOutcome::ToolFailure(ToolFailure {
                    message: "FFmpeg exited with non-zero status".to_string(),
                    exit_code: status.code(),
                    stderr,
                })
            }
            Settled::Cancelled => ProcessOutcome::Cancelled,
            Settled::TimedOut(after) => ProcessOutcome::ToolFailure(ToolFailure {
                message: format!("FFmpeg timed out after {} seconds", after.as_secs()),
                exit_code: None,
                stderr,
            }),
            Settled::WaitFailed(e) => ProcessOutcome::ToolFailure(ToolFailure {
                message: format!("Failed waiting for FFmpeg: {}", e),
                exit_code: None,
                stderr,
            }),
        }
    }

    /// Wait for child process with cancellation and timeout.
    ///
    /// Exactly one branch settles the run. Cancellation and timeout kill and
    /// reap the child before returning.
    async fn wait_for_completion(&self, child: &mut Child, cancel: &CancellationToken) -> Settled {
        let timeout = self.timeout;
        let watchdog = async move {
            match timeout {
                Some(after) => {
                    tokio::time::sleep(after).await;
                    after
                }
                None => std::future::pending().await,
            }
        };

        let settled = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("FFmpeg cancelled, killing process");
                Settled::Cancelled
            }
            after = watchdog => {
                warn!("FFmpeg timed out after {} seconds, killing process", after.as_secs());
                Settled::TimedOut(after)
            }
            status = child.wait() => {
                return match status {
                    Ok(status) => Settled::Exited(status),
                    Err(e) => Settled::WaitFailed(e),
                };
            }
        };

        if let Err(e) = child.kill().await {
            warn!("Failed to kill FFmpeg process: {}", e);
        }

        settled
    }
}

/// Read stderr to EOF: progress blocks are logged (throttled) and forwarded,
/// everything else is kept as a bounded diagnostic tail.
async fn read_stderr(
    stderr: ChildStderr,
    expected_duration_ms: Option<i64>,
    progress_callback: Option<ProgressCallback>,
) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut parser = ProgressParser::new();
    let mut throttle = LogThrottle::default();
    let mut tail = DiagnosticTail::new(MAX_STDERR_BYTES);

    while let Ok(Some(line)) = lines.next_line().await {
        match parser.feed(&line) {
            ProgressLine::Block(progress) => {
                if throttle.ready(Instant::now()) {
                    log_progress(&progress, expected_duration_ms);
                }
                if let Some(ref callback) = progress_callback {
                    callback(&progress);
                }
            }
            ProgressLine::Field => {}
            ProgressLine::Other => tail.push(&line),
        }
    }

    tail.into_string()
}

fn log_progress(progress: &FfmpegProgress, expected_duration_ms: Option<i64>) {
    let percent = expected_duration_ms.and_then(|total| progress.percentage(total));
    match (percent, progress.timemark()) {
        (Some(percent), Some(mark)) => info!("FFmpeg {:.1}% | {}", percent, mark),
        (None, Some(mark)) => info!("FFmpeg time {}", mark),
        _ => info!("FFmpeg working..."),
    }
}

/// Bounded tail of diagnostic lines.
struct DiagnosticTail {
    lines: VecDeque<String>,
    bytes: usize,
    limit: usize,
}

impl DiagnosticTail {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            limit,
        }
    }

    fn push(&mut self, line: &str) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        self.bytes += line.len() + 1;
        self.lines.push_back(line.to_string());
        while self.bytes > self.limit {
            match self.lines.pop_front() {
                Some(dropped) => self.bytes -= dropped.len() + 1,
                None => break,
            }
        }
    }

    fn into_string(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|e| {
        MediaError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("FFmpeg not found in PATH: {}", e),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .output_args(["-c:v", "libx264", "-crf", "18"]);

        let args = cmd.build_args();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let codec = args.iter().position(|a| a == "-c:v").unwrap();
        assert!(ss < input, "seek must be an input option");
        assert!(input < codec, "codec must be an output option");
        assert_eq!(args[ss + 1], "10.000");
        assert!(args.contains(&"pipe:2".to_string()));
        assert_eq!(cmd.expected_duration_ms, Some(30_000));
    }

    #[test]
    fn test_frame_filter_builder() {
        let args = FfmpegCommand::new("in.mp4", "/tmp/frame-%05d.png")
            .video_filter("fps=3,scale=120:-1")
            .variable_frame_rate()
            .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-vf fps=3,scale=120:-1 -vsync vfr /tmp/frame-%05d.png"));
    }

    #[test]
    fn test_diagnostic_tail_is_bounded() {
        let mut tail = DiagnosticTail::new(16);
        tail.push("first line");
        tail.push("second line");
        tail.push("third");
        let text = tail.into_string();
        assert!(!text.contains("first"));
        assert!(text.ends_with("third"));
    }

    #[tokio::test]
    async fn test_cancelled_before_spawn_does_not_spawn() {
        let token = CancellationToken::new();
        token.cancel();
        // A binary that cannot exist: spawning it would be a ToolFailure
        let runner = ProcessRunner::new("/nonexistent/ffmpeg");
        let outcome = runner.run_args(vec![], &token).await;
        assert_eq!(outcome, ProcessOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_tool_failure() {
        let runner = ProcessRunner::new("/nonexistent/ffmpeg");
        let outcome = runner.run_args(vec![], &CancellationToken::new()).await;
        match outcome {
            ProcessOutcome::ToolFailure(failure) => {
                assert!(failure.message.contains("Failed to spawn"));
                assert!(failure.exit_code.is_none());
            }
            other => panic!("expected tool failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_and_exit_code() {
        let runner = ProcessRunner::new("sh");
        let token = CancellationToken::new();

        let ok = runner.run_args(vec!["-c".into(), "exit 0".into()], &token).await;
        assert!(ok.is_success());

        let failed = runner
            .run_args(vec!["-c".into(), "echo 'Invalid data found' >&2; exit 3".into()], &token)
            .await;
        match failed {
            ProcessOutcome::ToolFailure(failure) => {
                assert_eq!(failure.exit_code, Some(3));
                assert_eq!(failure.stderr.as_deref(), Some("Invalid data found"));
            }
            other => panic!("expected tool failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_running_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("pid");
        let runner = ProcessRunner::new("sh");
        let token = CancellationToken::new();

        // Cancel once the child has recorded its pid
        let cancel = token.clone();
        let watched = pid_file.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                if std::fs::metadata(&watched).map(|m| m.len() > 0).unwrap_or(false) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            cancel.cancel();
        });

        let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
        let started = Instant::now();
        let outcome = runner.run_args(vec!["-c".into(), script], &token).await;
        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let alive = std::process::Command::new("sh")
            .args(["-c", &format!("kill -0 {}", pid.trim())])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success(), "process {} still running", pid.trim());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_tool_failure() {
        let runner = ProcessRunner::new("sleep").with_timeout(Duration::from_millis(100));
        let outcome = runner.run_args(vec!["30".into()], &CancellationToken::new()).await;
        match outcome {
            ProcessOutcome::ToolFailure(failure) => assert!(failure.message.contains("timed out")),
            other => panic!("expected tool failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_progress_callback_receives_blocks() {
        use std::sync::{Arc, Mutex};

        let runner = ProcessRunner::new("sh");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        // `run_with_progress` appends FFmpeg flags; the script ignores them
        let script = "printf 'out_time_us=1000000\\nprogress=continue\\nout_time_us=2000000\\nprogress=end\\n' >&2";
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let mut args = vec!["-c".to_string(), script.to_string(), "sh".to_string()];
        args.extend(cmd.build_args());

        let outcome = runner
            .execute(
                args,
                Some(2000),
                &CancellationToken::new(),
                Some(Box::new(move |p: &FfmpegProgress| {
                    sink.lock().unwrap().push(p.out_time_ms)
                })),
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(*seen.lock().unwrap(), vec![1000, 2000]);
    }
}
