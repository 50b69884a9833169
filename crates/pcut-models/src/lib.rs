//! Shared data models for the PoseCut pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Stream identity and per-stream metadata
//! - Collaborator records (pose matches, verified face matches)
//! - Transition events and transformation orders
//! - The timeline document consumed by the renderer
//! - The persisted analysis snapshot
//! - Render encoding configuration

pub mod encoding;
pub mod records;
pub mod snapshot;
pub mod stream;
pub mod timeline;
pub mod transition;

// Re-export common types
pub use encoding::RenderEncodingConfig;
pub use records::{
    PoseCandidate, PoseMatchRow, RecordError, RecordResult, StreamAnalysisArtifact, StreamPair,
    Vec4, VerifiedMatch, ZERO_VEC4,
};
pub use snapshot::{AnalysisSnapshot, AnalysisStage, StreamWarning, SNAPSHOT_VERSION};
pub use stream::{FrameIndex, StreamId, StreamMetadata};
pub use timeline::{CrossPoint, MetaInfo, TimelineDocument, TimelineStream, VectorPair};
pub use transition::{AlignmentPair, ManualSegment, Tier, TransformationOrder, TransitionEvent};
