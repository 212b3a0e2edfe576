//! External tool invocation (yt-dlp, FFmpeg, FFprobe).

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// External binaries the extractor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    /// Binary name looked up in `PATH`.
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    fn not_found(&self) -> MediaError {
        match self {
            Tool::YtDlp => MediaError::YtDlpNotFound,
            Tool::Ffmpeg => MediaError::FfmpegNotFound,
            Tool::Ffprobe => MediaError::FfprobeNotFound,
        }
    }

    /// Resolve the binary in `PATH`.
    pub fn locate(&self) -> MediaResult<PathBuf> {
        which::which(self.binary()).map_err(|_| self.not_found())
    }
}

/// Options shared by every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOptions {
    /// Kill the tool after this many seconds
    pub timeout_secs: u64,
    /// Netscape cookies file passed to yt-dlp
    pub cookies_path: Option<PathBuf>,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 1800,
            cookies_path: None,
        }
    }
}

/// A single tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    tool: Tool,
    args: Vec<String>,
}

impl ToolCommand {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            args: Vec::new(),
        }
    }

    /// Start a yt-dlp command, adding the cookies file when configured.
    pub fn yt_dlp(options: &ToolOptions) -> Self {
        let cmd = Self::new(Tool::YtDlp);
        match &options.cookies_path {
            Some(path) => cmd.arg("--cookies").arg(path.to_string_lossy()),
            None => cmd,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion and capture output.
    ///
    /// A non-zero exit status is not an error here; callers decide what a
    /// failed run means for their operation.
    pub async fn output(&self, timeout_secs: u64) -> MediaResult<Output> {
        let binary = self.tool.locate()?;
        debug!("Running {} {}", self.tool.binary(), self.args.join(" "));

        let child = Command::new(binary)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(
                    "{} timed out after {} seconds, killing process",
                    self.tool.binary(),
                    timeout_secs
                );
                Err(MediaError::Timeout(timeout_secs))
            }
        }
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input path or URL
    input: String,
    /// Output path or pattern
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command. `input` may be a file path or a URL.
    pub fn new(input: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.into(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
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

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Limit the number of output video frames.
    pub fn max_frames(self, count: u64) -> Self {
        self.output_arg("-frames:v").output_arg(count.to_string())
    }

    /// JPEG/MJPEG quality scale (2 is near-lossless).
    pub fn quality(self, q: u8) -> Self {
        self.output_arg("-q:v").output_arg(q.to_string())
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Run the command, mapping a non-zero exit to [`MediaError::FfmpegFailed`].
    pub async fn run(&self, timeout_secs: u64) -> MediaResult<()> {
        let output = ToolCommand::new(Tool::Ffmpeg)
            .args(self.build_args())
            .output(timeout_secs)
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_tail(&output)),
                output.status.code(),
            ))
        }
    }
}

/// Last non-empty stderr line, for error messages.
pub fn stderr_tail(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("Unknown error")
        .trim()
        .to_string()
}

/// Check that every tool the extractor needs is installed.
pub fn check_tools() -> MediaResult<()> {
    for tool in [Tool::YtDlp, Tool::Ffmpeg, Tool::Ffprobe] {
        tool.locate()?;
    }
    Ok(())
}
