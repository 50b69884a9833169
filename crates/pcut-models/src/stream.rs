//! Stream identity and metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::records::{RecordError, RecordResult};

/// Frame number within the shared sampling timebase.
pub type FrameIndex = u64;

/// Identifier for one source video.
///
/// Derived from the stream's analysis artifact (the video file stem), and
/// stable for the whole pipeline run.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl StreamId {
    /// Create from an existing string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive the id from a video path (file stem).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self(stem)
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-stream metadata supplied by the analysis collaborator (or ffprobe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StreamMetadata {
    /// Stream identifier
    pub stream_id: StreamId,
    /// Source video path
    pub file_path: PathBuf,
    /// Frames per second
    pub frame_rate: f64,
    /// Total number of frames (0 when unknown)
    #[serde(default)]
    pub total_frames: u64,
    /// Duration in seconds
    pub duration: f64,
}

impl StreamMetadata {
    /// Create metadata, deriving the frame count from duration and frame rate.
    pub fn new(
        stream_id: impl Into<StreamId>,
        file_path: impl Into<PathBuf>,
        frame_rate: f64,
        duration: f64,
    ) -> Self {
        let total_frames = if frame_rate > 0.0 && duration > 0.0 {
            (duration * frame_rate).round() as u64
        } else {
            0
        };
        Self {
            stream_id: stream_id.into(),
            file_path: file_path.into(),
            frame_rate,
            total_frames,
            duration,
        }
    }

    /// Convert a frame index on this stream's timebase to seconds.
    pub fn frame_to_seconds(&self, frame: FrameIndex) -> f64 {
        frame as f64 / self.frame_rate
    }

    /// Convert seconds to the frame index at or before that instant.
    pub fn seconds_to_frame(&self, seconds: f64) -> FrameIndex {
        (seconds.max(0.0) * self.frame_rate).floor() as FrameIndex
    }

    /// Validate the metadata row.
    pub fn validate(&self) -> RecordResult<()> {
        if self.stream_id.as_str().is_empty() {
            return Err(RecordError::EmptyStreamId);
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(RecordError::InvalidFrameRate {
                stream: self.stream_id.clone(),
                frame_rate: self.frame_rate,
            });
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(RecordError::InvalidDuration {
                stream: self.stream_id.clone(),
                duration: self.duration,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_from_path() {
        let id = StreamId::from_path("/data/cam_left.mp4");
        assert_eq!(id.as_str(), "cam_left");
    }

    #[test]
    fn test_metadata_frame_conversion() {
        let meta = StreamMetadata::new("a", "a.mp4", 30.0, 10.0);
        assert_eq!(meta.total_frames, 300);
        assert!((meta.frame_to_seconds(150) - 5.0).abs() < 1e-9);
        assert_eq!(meta.seconds_to_frame(5.0), 150);
    }

    #[test]
    fn test_metadata_rejects_zero_frame_rate() {
        let meta = StreamMetadata::new("a", "a.mp4", 0.0, 10.0);
        assert!(matches!(
            meta.validate(),
            Err(RecordError::InvalidFrameRate { .. })
        ));
    }

    #[test]
    fn test_stream_id_serializes_transparent() {
        let json = serde_json::to_string(&StreamId::new("cam")).unwrap();
        assert_eq!(json, "\"cam\"");
    }
}
