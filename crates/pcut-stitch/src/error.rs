//! Error types for stitching operations.

use pcut_models::{FrameIndex, RecordError, StreamId};
use std::fmt;
use thiserror::Error;

/// Result type for stitching operations.
pub type StitchResult<T> = Result<T, StitchError>;

/// Which ordering rule an event broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Event names a stream outside the caller's stream list
    UnknownStream(StreamId),
    /// Event cuts from a stream to itself
    SelfCut,
    /// First event does not leave the opening stream
    WrongInitialStream { expected: StreamId, found: StreamId },
    /// Event's source is not the currently active stream
    BrokenChain { expected: StreamId, found: StreamId },
    /// Event frame is not strictly after the previous event's frame
    NonIncreasingFrame { previous: FrameIndex },
    /// Event returns to a stream that was already played
    Revisit(StreamId),
    /// Cut lies beyond the end of the named stream
    FrameBeyondStream { stream: StreamId },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::UnknownStream(s) => write!(f, "unknown stream {}", s),
            ViolationKind::SelfCut => write!(f, "cut from a stream to itself"),
            ViolationKind::WrongInitialStream { expected, found } => {
                write!(f, "first cut must leave {}, not {}", expected, found)
            }
            ViolationKind::BrokenChain { expected, found } => {
                write!(f, "active stream is {}, but cut leaves {}", expected, found)
            }
            ViolationKind::NonIncreasingFrame { previous } => {
                write!(f, "frame does not follow previous cut at frame {}", previous)
            }
            ViolationKind::Revisit(s) => write!(f, "stream {} was already played", s),
            ViolationKind::FrameBeyondStream { stream } => {
                write!(f, "cut lies beyond the end of stream {}", stream)
            }
        }
    }
}

/// Errors that can occur while building or checking a transformation order.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Too many streams: {count} (maximum {max})")]
    TooManyStreams { count: usize, max: usize },

    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    #[error("Invariant violation at cut {index} (frame {frame}): {kind}")]
    InvariantViolation {
        index: usize,
        frame: FrameIndex,
        kind: ViolationKind,
    },

    #[error("Invalid record: {0}")]
    Record(#[from] RecordError),
}

impl StitchError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invariant violation error.
    pub fn violation(index: usize, frame: FrameIndex, kind: ViolationKind) -> Self {
        Self::InvariantViolation { index, frame, kind }
    }

    /// Check if the error was caused by the caller's input rather than a broken order.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            StitchError::InvalidInput(_)
                | StitchError::TooManyStreams { .. }
                | StitchError::UnknownStream(_)
                | StitchError::Record(_)
        )
    }
}
