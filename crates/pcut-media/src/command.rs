//! FFmpeg invocations for segment extraction and concatenation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use pcut_models::RenderEncodingConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult, Tool};
use crate::progress::FfmpegProgress;

const STDERR_TAIL_LINES: usize = 20;

/// Output stream handling.
#[derive(Debug, Clone, PartialEq)]
enum Codec {
    /// Let FFmpeg pick its defaults
    Default,
    Copy,
    Encode(Vec<String>),
}

/// One FFmpeg call: an input window written to an output file.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    /// Input is a concat demuxer list rather than a video
    concat_list: bool,
    seek: Option<f64>,
    duration: Option<f64>,
    codec: Codec,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            concat_list: false,
            seek: None,
            duration: None,
            codec: Codec::Default,
        }
    }

    /// Start reading at `seconds` (input-side seek).
    pub fn seek(mut self, seconds: f64) -> Self {
        self.seek = Some(seconds);
        self
    }

    /// Read at most `seconds` of input.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Read the input as a concat demuxer list.
    pub fn concat_demuxer(mut self) -> Self {
        self.concat_list = true;
        self
    }

    /// Copy streams without re-encoding.
    pub fn stream_copy(mut self) -> Self {
        self.codec = Codec::Copy;
        self
    }

    pub fn encoding(mut self, config: &RenderEncodingConfig) -> Self {
        self.codec = Codec::Encode(config.to_ffmpeg_args());
        self
    }

    pub fn target(&self) -> &Path {
        &self.output
    }

    /// Expected output length in milliseconds, when bounded.
    fn expected_ms(&self) -> Option<i64> {
        self.duration.map(|d| (d * 1000.0).round() as i64)
    }

    /// Full argument list, without the program name.
    pub fn build_args(&self) -> Vec<String> {
        // Progress blocks go to stderr next to error output
        let mut args: Vec<String> = ["-y", "-v", "error", "-progress", "pipe:2"]
            .into_iter()
            .map(String::from)
            .collect();

        if self.concat_list {
            args.extend(["-f", "concat", "-safe", "0"].map(String::from));
        }
        if let Some(seek) = self.seek {
            args.push("-ss".into());
            args.push(format!("{:.3}", seek));
        }
        if let Some(duration) = self.duration {
            args.push("-t".into());
            args.push(format!("{:.3}", duration));
        }
        args.push("-i".into());
        args.push(self.input.to_string_lossy().into_owned());

        match &self.codec {
            Codec::Default => {}
            Codec::Copy => args.extend(["-c", "copy"].map(String::from)),
            Codec::Encode(encode) => args.extend(encode.iter().cloned()),
        }
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Runs FFmpeg with timeout and cancellation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Whether cancellation was already requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run `cmd` to completion, logging progress at debug level.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;
        if self.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let args = cmd.build_args();
        debug!("Running ffmpeg {}", args.join(" "));

        let mut child = Command::new(Tool::Ffmpeg.binary())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_tail = match child.stderr.take() {
            Some(stderr) => {
                let target = cmd.target().display().to_string();
                let expected_ms = cmd.expected_ms();
                Some(tokio::spawn(async move {
                    drain_stderr(BufReader::new(stderr), target, expected_ms).await
                }))
            }
            None => None,
        };

        let result = self.wait(&mut child, cmd.target()).await;
        let tail = match stderr_tail {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        result.map_err(|e| e.with_stderr(tail))
    }

    async fn wait(&self, child: &mut Child, target: &Path) -> MediaResult<()> {
        let mut cancel_rx = self.cancel_rx.clone();

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = sleep_or_forever(self.timeout_secs.map(Duration::from_secs)) => {
                let secs = self.timeout_secs.unwrap_or_default();
                warn!(target = %target.display(), "ffmpeg exceeded {}s; killing", secs);
                let _ = child.kill().await;
                return Err(MediaError::Timeout(secs));
            }
            _ = cancelled(&mut cancel_rx) => {
                info!(target = %target.display(), "Render cancelled; killing ffmpeg");
                let _ = child.kill().await;
                return Err(MediaError::Cancelled);
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::tool_failed(Tool::Ffmpeg, target, status.code()))
        }
    }
}

/// Consume stderr, logging progress blocks and keeping the last error lines.
async fn drain_stderr<R>(reader: BufReader<R>, target: String, expected_ms: Option<i64>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    let mut current = FfmpegProgress::default();
    let mut tail: Vec<String> = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(progress) = FfmpegProgress::parse_line(&line, &mut current) {
            debug!(
                target = %target,
                frame = progress.frame,
                speed = progress.speed,
                percent = expected_ms.map(|ms| progress.percentage(ms)),
                "ffmpeg progress"
            );
        } else if !line.contains('=') {
            if tail.len() == STDERR_TAIL_LINES {
                tail.remove(0);
            }
            tail.push(line);
        }
    }
    tail.join("\n")
}

async fn sleep_or_forever(deadline: Option<Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// Resolves once the cancel flag turns true; never resolves without a receiver.
async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling.
            return std::future::pending().await;
        }
    }
}

fn locate(tool: Tool) -> MediaResult<PathBuf> {
    which::which(tool.binary()).map_err(|_| MediaError::ToolMissing(tool))
}

pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    locate(Tool::Ffmpeg)
}

pub fn check_ffprobe() -> MediaResult<PathBuf> {
    locate(Tool::Ffprobe)
}
