//! Per-frame index of pose-compatible stream pairs.
//!
//! The pose-comparison collaborator emits, for every stream, the partner
//! streams it matches at each frame. The same match usually shows up twice
//! (once in each stream's artifact), so the index normalizes pair order and
//! deduplicates before anything downstream looks at it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use pcut_models::{
    AlignmentPair, FrameIndex, PoseCandidate, PoseMatchRow, StreamId, StreamPair,
};
use tracing::{debug, warn};

/// Immutable frame → pose candidate index.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceIndex {
    by_frame: HashMap<FrameIndex, BTreeSet<StreamPair>>,
    /// Frames in ascending order
    frames: Vec<FrameIndex>,
    /// Pose alignment vectors in canonical pair orientation
    alignments: HashMap<(FrameIndex, StreamPair), AlignmentPair>,
}

impl CorrespondenceIndex {
    /// Build the index from per-stream pose match rows.
    ///
    /// Rows that cannot form a valid pair (empty id, self match) are skipped.
    pub fn index(raw: &BTreeMap<StreamId, Vec<PoseMatchRow>>) -> Self {
        let mut builder = IndexBuilder::default();
        for (owner, rows) in raw {
            for row in rows {
                let pair = match StreamPair::new(owner.clone(), row.partner.clone()) {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(stream = %owner, frame = row.frame, error = %e, "Skipping pose row");
                        continue;
                    }
                };
                let alignment = match (row.vector_self, row.vector_partner) {
                    (Some(own), Some(partner)) => {
                        let oriented = AlignmentPair::new(own, partner);
                        Some(if pair.is_first(owner) {
                            oriented
                        } else {
                            oriented.swapped()
                        })
                    }
                    _ => None,
                };
                builder.insert(row.frame, pair, alignment);
            }
        }
        let index = builder.finish();
        debug!(
            frames = index.frame_count(),
            candidates = index.candidate_count(),
            "Built correspondence index"
        );
        index
    }

    /// Build the index from already-formed candidates.
    pub fn from_candidates(candidates: impl IntoIterator<Item = PoseCandidate>) -> Self {
        let mut builder = IndexBuilder::default();
        for c in candidates {
            builder.insert(c.frame, c.pair, None);
        }
        builder.finish()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames with at least one candidate.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Total number of deduplicated candidates.
    pub fn candidate_count(&self) -> usize {
        self.by_frame.values().map(BTreeSet::len).sum()
    }

    /// Frames in ascending order.
    pub fn frames(&self) -> &[FrameIndex] {
        &self.frames
    }

    pub fn pairs_at(&self, frame: FrameIndex) -> Option<&BTreeSet<StreamPair>> {
        self.by_frame.get(&frame)
    }

    /// Number of candidate pairs at `frame`.
    pub fn pair_count(&self, frame: FrameIndex) -> usize {
        self.by_frame.get(&frame).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, frame: FrameIndex, pair: &StreamPair) -> bool {
        self.by_frame
            .get(&frame)
            .is_some_and(|pairs| pairs.contains(pair))
    }

    /// Pose alignment vectors, oriented to the canonical pair order.
    pub fn alignment(&self, frame: FrameIndex, pair: &StreamPair) -> Option<AlignmentPair> {
        self.alignments.get(&(frame, pair.clone())).copied()
    }

    /// Iterate `(frame, pairs)` in ascending frame order.
    pub fn iter(&self) -> impl Iterator<Item = (FrameIndex, &BTreeSet<StreamPair>)> {
        self.frames
            .iter()
            .filter_map(move |f| self.by_frame.get(f).map(|pairs| (*f, pairs)))
    }

    /// All candidates in ascending (frame, pair) order.
    pub fn candidates(&self) -> Vec<PoseCandidate> {
        self.iter()
            .flat_map(|(frame, pairs)| {
                pairs.iter().map(move |pair| PoseCandidate {
                    frame,
                    pair: pair.clone(),
                })
            })
            .collect()
    }
}

#[derive(Default)]
struct IndexBuilder {
    by_frame: HashMap<FrameIndex, BTreeSet<StreamPair>>,
    alignments: HashMap<(FrameIndex, StreamPair), AlignmentPair>,
}

impl IndexBuilder {
    fn insert(&mut self, frame: FrameIndex, pair: StreamPair, alignment: Option<AlignmentPair>) {
        if let Some(alignment) = alignment {
            // First reported vectors win; both artifacts describe the same match.
            self.alignments
                .entry((frame, pair.clone()))
                .or_insert(alignment);
        }
        self.by_frame.entry(frame).or_default().insert(pair);
    }

    fn finish(self) -> CorrespondenceIndex {
        let mut frames: Vec<FrameIndex> = self.by_frame.keys().copied().collect();
        frames.sort_unstable();
        CorrespondenceIndex {
            by_frame: self.by_frame,
            frames,
            alignments: self.alignments,
        }
    }
}
