//! Identity filtering of pose candidates.
//!
//! Intersects the pose index with face-verified matches. Verification is
//! best-effort: it only runs on single-subject streams, and when it produced
//! nothing the pose candidates pass through untouched at `PoseOnly` tier.

use std::collections::{BTreeSet, HashMap, HashSet};

use pcut_models::{AlignmentPair, FrameIndex, StreamId, StreamPair, Tier, VerifiedMatch};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::correspondence::CorrespondenceIndex;

/// How verified matches combine with pose candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Keep only pose candidates that were also verified
    #[default]
    Strict,
    /// Keep a frame's verified pairs when it has any, its pose pairs otherwise
    Prefer,
}

impl IdentityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityPolicy::Strict => "strict",
            IdentityPolicy::Prefer => "prefer",
        }
    }
}

impl std::str::FromStr for IdentityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(IdentityPolicy::Strict),
            "prefer" => Ok(IdentityPolicy::Prefer),
            other => Err(format!("Unknown identity policy: {}", other)),
        }
    }
}

/// Surviving pairs at one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredFrame {
    pub frame: FrameIndex,
    pub pairs: BTreeSet<StreamPair>,
    pub tier: Tier,
}

/// Output of the identity filter: one entry per frame with surviving pairs.
#[derive(Debug, Clone, Default)]
pub struct FilteredCorrespondence {
    frames: Vec<FilteredFrame>,
    alignments: HashMap<(FrameIndex, StreamPair), AlignmentPair>,
}

impl FilteredCorrespondence {
    /// Build directly from frames (sorted by frame on construction).
    pub fn from_frames(mut frames: Vec<FilteredFrame>) -> Self {
        frames.retain(|f| !f.pairs.is_empty());
        frames.sort_by_key(|f| f.frame);
        frames.dedup_by_key(|f| f.frame);
        Self {
            frames,
            alignments: HashMap::new(),
        }
    }

    /// Attach alignment vectors (canonical pair orientation).
    pub fn with_alignment(
        mut self,
        frame: FrameIndex,
        pair: StreamPair,
        alignment: AlignmentPair,
    ) -> Self {
        self.alignments.insert((frame, pair), alignment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[FilteredFrame] {
        &self.frames
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilteredFrame> {
        self.frames.iter()
    }

    pub fn alignment(&self, frame: FrameIndex, pair: &StreamPair) -> Option<AlignmentPair> {
        self.alignments.get(&(frame, pair.clone())).copied()
    }

    /// Whether every surviving frame is tagged with `tier`.
    pub fn all_tier(&self, tier: Tier) -> bool {
        self.frames.iter().all(|f| f.tier == tier)
    }
}

/// Intersects pose candidates with identity-verified matches.
#[derive(Debug, Clone, Default)]
pub struct IdentityFilter {
    policy: IdentityPolicy,
}

impl IdentityFilter {
    pub fn new(policy: IdentityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> IdentityPolicy {
        self.policy
    }

    /// Filter the pose index against verified matches.
    ///
    /// Invalid verified rows are skipped. If no valid verified rows remain the
    /// whole index passes through at `PoseOnly` tier.
    pub fn filter(
        &self,
        pose_index: &CorrespondenceIndex,
        verified_matches: &[VerifiedMatch],
    ) -> FilteredCorrespondence {
        let mut verified: HashMap<(FrameIndex, StreamPair), AlignmentPair> = HashMap::new();
        for m in verified_matches {
            match m.validate() {
                Ok(pair) => {
                    let (first, second) = m.canonical_vectors(&pair);
                    verified
                        .entry((m.frame, pair))
                        .or_insert(AlignmentPair::new(first, second));
                }
                Err(e) => warn!(frame = m.frame, error = %e, "Skipping verified match"),
            }
        }

        if verified.is_empty() {
            info!(
                frames = pose_index.frame_count(),
                "No verified matches; using pose candidates only"
            );
            return self.pass_through(pose_index);
        }

        let mut frames = Vec::new();
        let mut alignments = HashMap::new();

        for (frame, pairs) in pose_index.iter() {
            let mut kept = BTreeSet::new();
            for pair in pairs {
                if let Some(alignment) = verified.get(&(frame, pair.clone())) {
                    alignments.insert((frame, pair.clone()), *alignment);
                    kept.insert(pair.clone());
                }
            }

            if !kept.is_empty() {
                frames.push(FilteredFrame {
                    frame,
                    pairs: kept,
                    tier: Tier::IdentityVerified,
                });
            } else if self.policy == IdentityPolicy::Prefer {
                for pair in pairs {
                    if let Some(alignment) = pose_index.alignment(frame, pair) {
                        alignments.insert((frame, pair.clone()), alignment);
                    }
                }
                frames.push(FilteredFrame {
                    frame,
                    pairs: pairs.clone(),
                    tier: Tier::PoseOnly,
                });
            }
        }

        let verified_frames = frames
            .iter()
            .filter(|f| f.tier == Tier::IdentityVerified)
            .count();
        info!(
            pose_frames = pose_index.frame_count(),
            surviving_frames = frames.len(),
            verified_frames = verified_frames,
            policy = self.policy.as_str(),
            "Identity filter applied"
        );

        FilteredCorrespondence { frames, alignments }
    }

    fn pass_through(&self, pose_index: &CorrespondenceIndex) -> FilteredCorrespondence {
        let mut alignments = HashMap::new();
        let frames = pose_index
            .iter()
            .map(|(frame, pairs)| {
                for pair in pairs {
                    if let Some(alignment) = pose_index.alignment(frame, pair) {
                        alignments.insert((frame, pair.clone()), alignment);
                    }
                }
                FilteredFrame {
                    frame,
                    pairs: pairs.clone(),
                    tier: Tier::PoseOnly,
                }
            })
            .collect();
        FilteredCorrespondence { frames, alignments }
    }
}

/// Drop verified matches that touch multi-person streams.
///
/// Face identity is only meaningful when a stream shows a single subject.
/// Returns the kept matches and how many were dropped.
pub fn gate_single_subject(
    verified: Vec<VerifiedMatch>,
    eligible: &HashSet<StreamId>,
) -> (Vec<VerifiedMatch>, usize) {
    let before = verified.len();
    let kept: Vec<VerifiedMatch> = verified
        .into_iter()
        .filter(|m| eligible.contains(&m.stream_a) && eligible.contains(&m.stream_b))
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        debug!(dropped = dropped, "Dropped verified matches on multi-person streams");
    }
    (kept, dropped)
}
