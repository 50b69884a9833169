//! End-to-end stitching over an analysis snapshot.

use std::collections::BTreeSet;

use pcut_models::{
    AnalysisSnapshot, ManualSegment, StreamId, StreamWarning, Tier, TimelineDocument,
    TransformationOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assemble::TimelineAssembler;
use crate::correspondence::CorrespondenceIndex;
use crate::error::{StitchError, StitchResult};
use crate::identity::{IdentityFilter, IdentityPolicy};
use crate::manual::order_from_segments;
use crate::search::{SearchConfig, TransformationOrderSearch};

/// Options for one stitch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StitchOptions {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub identity_policy: IdentityPolicy,
}

/// Where the order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    Search,
    Manual,
}

/// Summary of a stitch run, written next to the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchReport {
    pub snapshot_id: String,
    pub source: OrderSource,
    /// False when no cut was possible and the opening stream plays alone
    pub viable: bool,
    pub order: TransformationOrder,
    /// Streams in timeline order
    pub streams: Vec<StreamId>,
    pub covered_streams: Vec<StreamId>,
    pub verified_cuts: usize,
    pub pose_frames: usize,
    pub filtered_frames: usize,
    /// Verified matches were absent, so every candidate stayed pose-only
    pub identity_fallback: bool,
    #[serde(default)]
    pub warnings: Vec<StreamWarning>,
}

impl StitchReport {
    /// Streams that never play a segment.
    pub fn uncovered_streams(&self) -> Vec<StreamId> {
        let covered: BTreeSet<&StreamId> = self.covered_streams.iter().collect();
        self.streams
            .iter()
            .filter(|s| !covered.contains(s))
            .cloned()
            .collect()
    }
}

/// Timeline plus report.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchPlan {
    pub timeline: TimelineDocument,
    pub report: StitchReport,
}

/// Runs index, filter, search (or manual conversion) and assembly.
#[derive(Debug, Clone, Default)]
pub struct Stitcher {
    options: StitchOptions,
}

impl Stitcher {
    pub fn new(options: StitchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StitchOptions {
        &self.options
    }

    /// Build the timeline for `snapshot`.
    ///
    /// A manual sequence bypasses the search but is still validated.
    pub fn stitch(
        &self,
        snapshot: &AnalysisSnapshot,
        manual: Option<&[ManualSegment]>,
    ) -> StitchResult<StitchPlan> {
        if snapshot.streams.is_empty() {
            return Err(StitchError::invalid_input("snapshot contains no analyzed streams"));
        }
        for warning in &snapshot.warnings {
            warn!(stream = %warning.stream, stage = %warning.stage, "{}", warning.message);
        }

        let allow_revisits = self.options.search.allow_revisits;
        let assembler = TimelineAssembler::new(allow_revisits);

        if let Some(segments) = manual {
            let manual = order_from_segments(segments, &snapshot.streams, allow_revisits)?;
            let timeline = assembler.assemble(&manual.order, &manual.streams)?;
            let viable = !manual.order.is_empty();
            let report = self.report(
                snapshot,
                OrderSource::Manual,
                viable,
                manual.order,
                manual.streams.iter().map(|m| m.stream_id.clone()).collect(),
                (0, 0, false),
            );
            return Ok(StitchPlan { timeline, report });
        }

        let index = CorrespondenceIndex::index(&snapshot.pose_matches);
        let filtered = IdentityFilter::new(self.options.identity_policy)
            .filter(&index, &snapshot.verified_matches);
        let identity_fallback = !filtered.is_empty() && filtered.all_tier(Tier::PoseOnly);

        let streams = snapshot.stream_ids();
        let outcome = TransformationOrderSearch::new(self.options.search.clone())
            .search_within(&filtered, &snapshot.streams)?;
        let viable = outcome.is_viable();
        let order = outcome.into_order();

        let timeline = assembler.assemble(&order, &snapshot.streams)?;
        let report = self.report(
            snapshot,
            OrderSource::Search,
            viable,
            order,
            streams,
            (index.frame_count(), filtered.len(), identity_fallback),
        );
        Ok(StitchPlan { timeline, report })
    }

    fn report(
        &self,
        snapshot: &AnalysisSnapshot,
        source: OrderSource,
        viable: bool,
        order: TransformationOrder,
        streams: Vec<StreamId>,
        (pose_frames, filtered_frames, identity_fallback): (usize, usize, bool),
    ) -> StitchReport {
        let covered_streams: Vec<StreamId> = if order.is_empty() {
            streams.first().cloned().into_iter().collect()
        } else {
            order.covered_streams().into_iter().collect()
        };

        info!(
            snapshot_id = %snapshot.snapshot_id,
            source = ?source,
            viable = viable,
            cuts = order.len(),
            covered = covered_streams.len(),
            streams = streams.len(),
            warnings = snapshot.warnings.len(),
            "Stitch plan ready"
        );

        StitchReport {
            snapshot_id: snapshot.snapshot_id.clone(),
            source,
            viable,
            verified_cuts: order.verified_count(),
            order,
            streams,
            covered_streams,
            pose_frames,
            filtered_frames,
            identity_fallback,
            warnings: snapshot.warnings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcut_models::{AnalysisStage, PoseMatchRow, StreamMetadata, VerifiedMatch};

    fn snapshot() -> AnalysisSnapshot {
        let mut snapshot = AnalysisSnapshot::new();
        snapshot.streams = vec![
            StreamMetadata::new("a", "a.mp4", 30.0, 10.0),
            StreamMetadata::new("b", "b.mp4", 30.0, 10.0),
            StreamMetadata::new("c", "c.mp4", 30.0, 10.0),
        ];
        snapshot.pose_matches.insert(
            StreamId::new("a"),
            vec![PoseMatchRow::new(30, "b"), PoseMatchRow::new(60, "c")],
        );
        snapshot
            .pose_matches
            .insert(StreamId::new("c"), vec![PoseMatchRow::new(90, "b")]);
        snapshot
    }

    #[test]
    fn test_search_path() {
        let plan = Stitcher::default().stitch(&snapshot(), None).unwrap();
        assert_eq!(plan.report.source, OrderSource::Search);
        assert!(plan.report.viable);
        assert!(plan.report.identity_fallback);
        assert_eq!(plan.report.order.frames(), vec![30, 90]);
        assert_eq!(plan.timeline.meta_info.num_cross, 2);
        assert!(plan.report.uncovered_streams().is_empty());
    }

    #[test]
    fn test_cut_past_stream_end_falls_back_to_first_stream() {
        let mut snapshot = AnalysisSnapshot::new();
        snapshot.streams = vec![
            StreamMetadata::new("a", "a.mp4", 30.0, 10.0),
            StreamMetadata::new("b", "b.mp4", 60.0, 4.0),
        ];
        snapshot
            .pose_matches
            .insert(StreamId::new("b"), vec![PoseMatchRow::new(150, "a")]);

        let plan = Stitcher::default().stitch(&snapshot, None).unwrap();
        assert!(!plan.report.viable);
        assert!(plan.report.order.is_empty());
        assert!(plan.timeline.is_passthrough());
        assert_eq!(plan.timeline.meta_info.num_cross, 0);
    }

    #[test]
    fn test_no_candidates_falls_back_to_first_stream() {
        let mut snapshot = snapshot();
        snapshot.pose_matches.clear();
        snapshot.add_warning(StreamWarning::new(
            StreamId::new("b"),
            AnalysisStage::PoseAnalysis,
            "artifact missing",
        ));
        let plan = Stitcher::default().stitch(&snapshot, None).unwrap();
        assert!(!plan.report.viable);
        assert!(plan.timeline.is_passthrough());
        assert_eq!(plan.report.covered_streams, vec![StreamId::new("a")]);
        assert_eq!(plan.report.warnings.len(), 1);
    }

    #[test]
    fn test_verified_matches_restrict_search() {
        let mut snapshot = snapshot();
        snapshot.verified_matches = vec![VerifiedMatch {
            frame: 30,
            stream_a: StreamId::new("a"),
            stream_b: StreamId::new("b"),
            face_iou: 0.8,
            eye_vector_a: [1.0; 4],
            eye_vector_b: [2.0; 4],
        }];
        let plan = Stitcher::default().stitch(&snapshot, None).unwrap();
        assert!(!plan.report.identity_fallback);
        assert_eq!(plan.report.order.frames(), vec![30]);
        assert_eq!(plan.report.verified_cuts, 1);
        assert_eq!(plan.timeline.cross_points[0].vector_pairs[0].vector1, [1.0; 4]);
    }

    #[test]
    fn test_manual_path_skips_search() {
        let segments = vec![ManualSegment::new("b", 0.0), ManualSegment::new("c", 3.0)];
        let plan = Stitcher::default()
            .stitch(&snapshot(), Some(&segments))
            .unwrap();
        assert_eq!(plan.report.source, OrderSource::Manual);
        assert_eq!(plan.report.streams[0], StreamId::new("b"));
        assert_eq!(plan.timeline.cross_points[0].time_stamp, 3.0);
        assert_eq!(plan.timeline.streams[0].file.to_str(), Some("b.mp4"));
    }

    #[test]
    fn test_partial_options_fill_defaults() {
        let options: StitchOptions = serde_json::from_str(
            r#"{"search": {"seed": 7, "allow_revisits": true}, "identity_policy": "prefer"}"#,
        )
        .unwrap();
        assert_eq!(options.identity_policy, IdentityPolicy::Prefer);
        assert_eq!(
            options.search,
            SearchConfig::default().with_seed(7).with_revisits(true)
        );
    }

    #[test]
    fn test_empty_snapshot_is_input_error() {
        let err = Stitcher::default()
            .stitch(&AnalysisSnapshot::new(), None)
            .unwrap_err();
        assert!(err.is_input_error());
    }
}
