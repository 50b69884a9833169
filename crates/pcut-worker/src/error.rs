//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No videos found in {0}")]
    NoStreams(PathBuf),

    #[error("Snapshot version {found} is not supported (expected {expected}); re-run analysis")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Invalid sequence file {path}: {message}")]
    InvalidSequence { path: PathBuf, message: String },

    #[error("Stitch error: {0}")]
    Stitch(#[from] pcut_stitch::StitchError),

    #[error("Media error: {0}")]
    Media(#[from] pcut_media::MediaError),

    #[error("Invalid record: {0}")]
    Record(#[from] pcut_models::RecordError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    /// Check if the run failed because of what the caller supplied.
    ///
    /// These need new inputs or settings; running again unchanged will not help.
    pub fn is_input_error(&self) -> bool {
        match self {
            WorkerError::ConfigError(_)
            | WorkerError::NoStreams(_)
            | WorkerError::SnapshotVersion { .. }
            | WorkerError::InvalidSequence { .. }
            | WorkerError::Record(_) => true,
            WorkerError::Stitch(e) => e.is_input_error(),
            _ => false,
        }
    }

    /// Check if rendering was interrupted by timeout or cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_interrupted())
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> i32 {
        if self.is_input_error() {
            2
        } else if self.is_interrupted() {
            130
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(WorkerError::NoStreams(PathBuf::from("videos")).exit_code(), 2);
        assert_eq!(
            WorkerError::from(pcut_media::MediaError::Cancelled).exit_code(),
            130
        );
        assert_eq!(WorkerError::analysis_failed("boom").exit_code(), 1);
    }

    #[test]
    fn test_stitch_violation_is_input_error() {
        let err = WorkerError::from(pcut_stitch::StitchError::invalid_input("no streams"));
        assert!(err.is_input_error());
    }
}
