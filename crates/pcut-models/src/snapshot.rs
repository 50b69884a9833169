//! Persisted analysis snapshot.
//!
//! The analyze stage produces one immutable snapshot; the render stage reads
//! it back. The snapshot is the only state shared between the two stages.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::records::{PoseMatchRow, VerifiedMatch};
use crate::stream::{StreamId, StreamMetadata};

/// Version of the snapshot format.
/// Increment this when the structure changes to invalidate old snapshots.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Pipeline stage a per-stream failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Metadata,
    PoseAnalysis,
    IdentityVerification,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::Metadata => "metadata",
            AnalysisStage::PoseAnalysis => "pose_analysis",
            AnalysisStage::IdentityVerification => "identity_verification",
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Isolated failure of one stream's analysis. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StreamWarning {
    pub stream: StreamId,
    pub stage: AnalysisStage,
    pub message: String,
}

impl StreamWarning {
    pub fn new(stream: StreamId, stage: AnalysisStage, message: impl Into<String>) -> Self {
        Self {
            stream,
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for StreamWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.stream, self.message)
    }
}

/// Merged result of every stream's analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSnapshot {
    /// Version of the snapshot format
    pub analysis_version: u32,

    /// Unique id of the analysis run
    pub snapshot_id: String,

    /// When the snapshot was created
    pub created_at: DateTime<Utc>,

    /// Successfully analyzed streams, in caller order
    pub streams: Vec<StreamMetadata>,

    /// Raw pose matches keyed by owning stream
    #[serde(default)]
    pub pose_matches: BTreeMap<StreamId, Vec<PoseMatchRow>>,

    /// Identity-verified matches (empty when verification did not run)
    #[serde(default)]
    pub verified_matches: Vec<VerifiedMatch>,

    /// Per-stream failures isolated during analysis
    #[serde(default)]
    pub warnings: Vec<StreamWarning>,
}

impl AnalysisSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self {
            analysis_version: SNAPSHOT_VERSION,
            snapshot_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            streams: Vec::new(),
            pose_matches: BTreeMap::new(),
            verified_matches: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check if this snapshot is compatible with the current version.
    pub fn is_current_version(&self) -> bool {
        self.analysis_version == SNAPSHOT_VERSION
    }

    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.streams.iter().map(|s| s.stream_id.clone()).collect()
    }

    pub fn metadata_for(&self, stream: &StreamId) -> Option<&StreamMetadata> {
        self.streams.iter().find(|s| &s.stream_id == stream)
    }

    pub fn add_warning(&mut self, warning: StreamWarning) {
        self.warnings.push(warning);
    }

    /// Total number of raw pose rows across streams.
    pub fn pose_row_count(&self) -> usize {
        self.pose_matches.values().map(Vec::len).sum()
    }
}

impl Default for AnalysisSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
