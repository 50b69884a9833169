//! Collaborator record types.
//!
//! These rows are produced by the pose-comparison and face-verification
//! collaborators. Malformed rows are rejected here, at the parsing boundary,
//! so the search never sees them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stream::{FrameIndex, StreamId, StreamMetadata};

/// Four-component geometric vector (eye line / pose alignment).
pub type Vec4 = [f64; 4];

/// All-zero vector used when a cut carries no alignment data.
pub const ZERO_VEC4: Vec4 = [0.0; 4];

/// Result type for record validation.
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised while validating collaborator rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("Stream id must not be empty")]
    EmptyStreamId,

    #[error("Stream {0} cannot be paired with itself")]
    SelfPair(StreamId),

    #[error("Invalid frame rate {frame_rate} for stream {stream}")]
    InvalidFrameRate { stream: StreamId, frame_rate: f64 },

    #[error("Invalid duration {duration} for stream {stream}")]
    InvalidDuration { stream: StreamId, duration: f64 },

    #[error("Non-finite vector component at frame {frame} for {field}")]
    NonFiniteVector { frame: FrameIndex, field: &'static str },

    #[error("Invalid face IoU {iou} at frame {frame}")]
    InvalidFaceIou { frame: FrameIndex, iou: f64 },

    #[error("Artifact for {artifact} lists matches owned by {found}")]
    ArtifactMismatch { artifact: StreamId, found: StreamId },
}

fn check_vec(v: &Vec4, frame: FrameIndex, field: &'static str) -> RecordResult<()> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(RecordError::NonFiniteVector { frame, field })
    }
}

/// Unordered stream pair stored in canonical (sorted) order.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct StreamPair {
    first: StreamId,
    second: StreamId,
}

impl StreamPair {
    /// Normalize `(a, b)` so that `(a, b)` and `(b, a)` compare equal.
    pub fn new(a: StreamId, b: StreamId) -> RecordResult<Self> {
        if a.as_str().is_empty() || b.as_str().is_empty() {
            return Err(RecordError::EmptyStreamId);
        }
        if a == b {
            return Err(RecordError::SelfPair(a));
        }
        if a < b {
            Ok(Self { first: a, second: b })
        } else {
            Ok(Self { first: b, second: a })
        }
    }

    pub fn first(&self) -> &StreamId {
        &self.first
    }

    pub fn second(&self) -> &StreamId {
        &self.second
    }

    pub fn contains(&self, stream: &StreamId) -> bool {
        &self.first == stream || &self.second == stream
    }

    /// The partner of `stream` in this pair, if `stream` is a member.
    pub fn other(&self, stream: &StreamId) -> Option<&StreamId> {
        if &self.first == stream {
            Some(&self.second)
        } else if &self.second == stream {
            Some(&self.first)
        } else {
            None
        }
    }

    /// Whether `a` is the canonical first member.
    pub fn is_first(&self, a: &StreamId) -> bool {
        &self.first == a
    }
}

/// "At this frame, the two streams are pose-compatible."
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PoseCandidate {
    pub frame: FrameIndex,
    pub pair: StreamPair,
}

impl PoseCandidate {
    pub fn new(frame: FrameIndex, a: StreamId, b: StreamId) -> RecordResult<Self> {
        Ok(Self {
            frame,
            pair: StreamPair::new(a, b)?,
        })
    }
}

/// One row of a per-stream pose match artifact.
///
/// The pose-comparison collaborator has already thresholded position, size
/// and keypoint-count deltas; a row only states that `partner` is compatible
/// with the owning stream at `frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoseMatchRow {
    pub frame: FrameIndex,
    pub partner: StreamId,
    /// Alignment vector measured on the owning stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_self: Option<Vec4>,
    /// Alignment vector measured on the partner stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_partner: Option<Vec4>,
}

impl PoseMatchRow {
    pub fn new(frame: FrameIndex, partner: impl Into<StreamId>) -> Self {
        Self {
            frame,
            partner: partner.into(),
            vector_self: None,
            vector_partner: None,
        }
    }

    pub fn with_vectors(mut self, vector_self: Vec4, vector_partner: Vec4) -> Self {
        self.vector_self = Some(vector_self);
        self.vector_partner = Some(vector_partner);
        self
    }

    pub fn validate(&self, owner: &StreamId) -> RecordResult<()> {
        if self.partner.as_str().is_empty() {
            return Err(RecordError::EmptyStreamId);
        }
        if &self.partner == owner {
            return Err(RecordError::SelfPair(owner.clone()));
        }
        if let Some(v) = &self.vector_self {
            check_vec(v, self.frame, "vector_self")?;
        }
        if let Some(v) = &self.vector_partner {
            check_vec(v, self.frame, "vector_partner")?;
        }
        Ok(())
    }
}

/// Face-identity confirmation of a pose candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VerifiedMatch {
    pub frame: FrameIndex,
    pub stream_a: StreamId,
    pub stream_b: StreamId,
    pub face_iou: f64,
    pub eye_vector_a: Vec4,
    pub eye_vector_b: Vec4,
}

impl VerifiedMatch {
    /// Validate the row and return its canonical pair.
    pub fn validate(&self) -> RecordResult<StreamPair> {
        if !self.face_iou.is_finite() || !(0.0..=1.0).contains(&self.face_iou) {
            return Err(RecordError::InvalidFaceIou {
                frame: self.frame,
                iou: self.face_iou,
            });
        }
        check_vec(&self.eye_vector_a, self.frame, "eye_vector_a")?;
        check_vec(&self.eye_vector_b, self.frame, "eye_vector_b")?;
        StreamPair::new(self.stream_a.clone(), self.stream_b.clone())
    }

    /// Eye vectors oriented to the canonical pair order.
    pub fn canonical_vectors(&self, pair: &StreamPair) -> (Vec4, Vec4) {
        if pair.is_first(&self.stream_a) {
            (self.eye_vector_a, self.eye_vector_b)
        } else {
            (self.eye_vector_b, self.eye_vector_a)
        }
    }
}

/// Per-stream artifact written by the analysis collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StreamAnalysisArtifact {
    pub stream_id: StreamId,
    /// Metadata, when the collaborator recorded it; probed otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StreamMetadata>,
    /// Largest number of people seen in any frame
    #[serde(default)]
    pub max_people_per_frame: u32,
    /// Pose-compatible partners per frame
    #[serde(default)]
    pub pose_matches: Vec<PoseMatchRow>,
}

impl StreamAnalysisArtifact {
    pub fn validate(&self) -> RecordResult<()> {
        if self.stream_id.as_str().is_empty() {
            return Err(RecordError::EmptyStreamId);
        }
        if let Some(meta) = &self.metadata {
            if meta.stream_id != self.stream_id {
                return Err(RecordError::ArtifactMismatch {
                    artifact: self.stream_id.clone(),
                    found: meta.stream_id.clone(),
                });
            }
            meta.validate()?;
        }
        for row in &self.pose_matches {
            row.validate(&self.stream_id)?;
        }
        Ok(())
    }

    /// Identity verification only applies to single-subject streams.
    pub fn eligible_for_identity(&self) -> bool {
        self.max_people_per_frame <= 1
    }
}
