//! Error types for probing and rendering.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// External tools the renderer shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolMissing(Tool),

    #[error("{tool} failed on {target}{}", exit_code.map(|c| format!(" (exit {})", c)).unwrap_or_default())]
    ToolFailed {
        tool: Tool,
        /// File the tool was producing or reading
        target: PathBuf,
        exit_code: Option<i32>,
        /// Last non-progress lines of stderr
        stderr: Option<String>,
    },

    #[error("Source video missing: {0}")]
    FileNotFound(PathBuf),

    #[error("Render cancelled")]
    Cancelled,

    #[error("Render step exceeded {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable ffprobe output: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Unusable video: {0}")]
    InvalidVideo(String),

    #[error("Timeline cannot be rendered: {0}")]
    InvalidTimeline(String),

    #[error("Invalid encoding config: {0}")]
    InvalidConfig(String),
}

impl MediaError {
    pub fn tool_failed(tool: Tool, target: impl Into<PathBuf>, exit_code: Option<i32>) -> Self {
        Self::ToolFailed {
            tool,
            target: target.into(),
            exit_code,
            stderr: None,
        }
    }

    /// Attach captured stderr to a tool failure; other errors pass through.
    pub fn with_stderr(self, captured: String) -> Self {
        match self {
            Self::ToolFailed {
                tool,
                target,
                exit_code,
                ..
            } if !captured.is_empty() => Self::ToolFailed {
                tool,
                target,
                exit_code,
                stderr: Some(captured),
            },
            other => other,
        }
    }

    pub fn invalid_timeline(message: impl Into<String>) -> Self {
        Self::InvalidTimeline(message.into())
    }

    /// Timeouts and cancellations abort the render rather than fail the input.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MediaError::Cancelled | MediaError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_message() {
        let err = MediaError::tool_failed(Tool::Ffmpeg, "out/segment_001.mp4", Some(1));
        assert_eq!(err.to_string(), "ffmpeg failed on out/segment_001.mp4 (exit 1)");

        let err = err.with_stderr("Invalid data found".to_string());
        assert!(matches!(err, MediaError::ToolFailed { stderr: Some(_), .. }));
    }

    #[test]
    fn test_interrupted() {
        assert!(MediaError::Timeout(60).is_interrupted());
        assert!(!MediaError::ToolMissing(Tool::Ffprobe).is_interrupted());
    }
}
