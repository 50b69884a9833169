//! Transformation order search.
//!
//! Selects the chain of cuts that plays as many distinct streams as possible.
//!
//! # Algorithm
//! 1. Expand every filtered pair `{A, B}` at frame `f` into the directed
//!    edges `A -> B` and `B -> A`, grouped into per-(source, target) lanes
//!    sorted by frame. With stream metadata, edges whose cut would run past
//!    either stream's end are dropped.
//! 2. Walk forward from the caller's first stream. At each decision the
//!    candidates are, for every admissible target, the earliest edge after the
//!    last cut and the earliest identity-verified edge after it. An earlier
//!    edge to the same target never reaches fewer streams, so later pose-only
//!    edges are never worth considering.
//! 3. Each candidate is scored by bounded lookahead: how many new streams the
//!    chain can still reach through it within `lookahead_depth` further cuts.
//!    Candidates split `max_expansions` evenly.
//! 4. Rank: coverage, then `IdentityVerified` before `PoseOnly`, then earliest
//!    frame, then a tie-break. Restart 0 breaks remaining ties by caller
//!    stream order; restarts `1..exploration_budget` break them with a
//!    `StdRng` seeded from `seed + restart`.
//! 5. The best walk across restarts wins by (streams covered, verified cuts,
//!    cut count, earliest frames). Earlier restarts win full ties, so the
//!    output is reproducible for a fixed seed.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap};

use metrics::{counter, histogram};
use pcut_models::{
    FrameIndex, StreamId, StreamMetadata, StreamPair, Tier, TransformationOrder, TransitionEvent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StitchError, StitchResult};
use crate::identity::FilteredCorrespondence;
use crate::validate::cut_beyond_end;

/// Maximum streams in one search (visited sets are 64-bit masks).
pub const MAX_STREAMS: usize = 64;

const DEFAULT_EXPLORATION_BUDGET: usize = 10;
const DEFAULT_LOOKAHEAD_DEPTH: usize = 8;
const DEFAULT_MAX_EXPANSIONS: usize = 200_000;

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of walks; walks after the first break exact ties randomly
    pub exploration_budget: usize,
    /// Seed for the tie-breaking RNG
    pub seed: u64,
    /// Allow cutting back to a stream that was already played
    pub allow_revisits: bool,
    /// Further cuts considered when scoring a candidate
    pub lookahead_depth: usize,
    /// Lookahead node ceiling per decision, shared evenly by its candidates
    pub max_expansions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exploration_budget: DEFAULT_EXPLORATION_BUDGET,
            seed: 0,
            allow_revisits: false,
            lookahead_depth: DEFAULT_LOOKAHEAD_DEPTH,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }
}

impl SearchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_exploration_budget(mut self, budget: usize) -> Self {
        self.exploration_budget = budget;
        self
    }

    pub fn with_revisits(mut self, allow: bool) -> Self {
        self.allow_revisits = allow;
        self
    }

    pub fn with_lookahead_depth(mut self, depth: usize) -> Self {
        self.lookahead_depth = depth;
        self
    }

    pub fn with_max_expansions(mut self, max: usize) -> Self {
        self.max_expansions = max;
        self
    }
}

/// Result of a search that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A chain with at least one cut
    Chain(TransformationOrder),
    /// No cut is possible; play the first stream alone
    NoViableTransitions,
}

impl SearchOutcome {
    pub fn is_viable(&self) -> bool {
        matches!(self, SearchOutcome::Chain(_))
    }

    pub fn order(&self) -> Option<&TransformationOrder> {
        match self {
            SearchOutcome::Chain(order) => Some(order),
            SearchOutcome::NoViableTransitions => None,
        }
    }

    /// The chain, or an empty order for the single-stream fallback.
    pub fn into_order(self) -> TransformationOrder {
        match self {
            SearchOutcome::Chain(order) => order,
            SearchOutcome::NoViableTransitions => TransformationOrder::empty(),
        }
    }
}

type Mask = u64;

fn bit(i: usize) -> Mask {
    1u64 << i
}

#[derive(Debug, Default)]
struct Lane {
    /// Every edge, ascending by frame
    all: Vec<(FrameIndex, Tier)>,
    /// Identity-verified edges, ascending
    verified: Vec<FrameIndex>,
}

/// Directed candidate edges between stream indices.
struct EdgeGraph {
    n: usize,
    lanes: Vec<Lane>,
}

impl EdgeGraph {
    /// `bounds`, when given, is indexed like the search streams.
    fn build(
        filtered: &FilteredCorrespondence,
        index_of: &HashMap<&StreamId, usize>,
        bounds: Option<&[StreamMetadata]>,
    ) -> Self {
        let n = index_of.len();
        let mut lanes: Vec<Lane> = (0..n * n).map(|_| Lane::default()).collect();
        let mut unknown: BTreeSet<StreamId> = BTreeSet::new();
        let mut out_of_bounds = 0usize;

        // Frames arrive ascending, so every lane stays sorted.
        for entry in filtered.iter() {
            for pair in &entry.pairs {
                let (a, b) = match (index_of.get(pair.first()), index_of.get(pair.second())) {
                    (Some(a), Some(b)) => (*a, *b),
                    (a, b) => {
                        if a.is_none() {
                            unknown.insert(pair.first().clone());
                        }
                        if b.is_none() {
                            unknown.insert(pair.second().clone());
                        }
                        continue;
                    }
                };
                for (from, to) in [(a, b), (b, a)] {
                    if let Some(meta) = bounds {
                        if cut_beyond_end(entry.frame, &meta[from], &meta[to]).is_some() {
                            out_of_bounds += 1;
                            continue;
                        }
                    }
                    let lane = &mut lanes[from * n + to];
                    lane.all.push((entry.frame, entry.tier));
                    if entry.tier.is_verified() {
                        lane.verified.push(entry.frame);
                    }
                }
            }
        }

        for stream in &unknown {
            warn!(stream = %stream, "Ignoring correspondences for stream outside the search input");
        }
        if out_of_bounds > 0 {
            debug!(edges = out_of_bounds, "Dropped cuts past the end of a stream");
        }

        Self { n, lanes }
    }

    fn lane(&self, from: usize, to: usize) -> &Lane {
        &self.lanes[from * self.n + to]
    }

    fn earliest(
        &self,
        from: usize,
        to: usize,
        after: Option<FrameIndex>,
    ) -> Option<(FrameIndex, Tier)> {
        let lane = &self.lane(from, to).all;
        let start = after.map_or(0, |a| lane.partition_point(|(f, _)| *f <= a));
        lane.get(start).copied()
    }

    fn earliest_verified(
        &self,
        from: usize,
        to: usize,
        after: Option<FrameIndex>,
    ) -> Option<FrameIndex> {
        let lane = &self.lane(from, to).verified;
        let start = after.map_or(0, |a| lane.partition_point(|f| *f <= a));
        lane.get(start).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    to: usize,
    frame: FrameIndex,
    tier: Tier,
    coverage: usize,
    tiebreak: u64,
}

impl Candidate {
    fn rank(&self) -> (usize, Tier, Reverse<FrameIndex>, u64) {
        (self.coverage, self.tier, Reverse(self.frame), self.tiebreak)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    from: usize,
    to: usize,
    frame: FrameIndex,
    tier: Tier,
}

#[derive(Debug, Clone)]
struct Walk {
    steps: Vec<Step>,
    covered: usize,
}

impl Walk {
    fn verified(&self) -> usize {
        self.steps.iter().filter(|s| s.tier.is_verified()).count()
    }

    fn frames(&self) -> Vec<FrameIndex> {
        self.steps.iter().map(|s| s.frame).collect()
    }

    fn compare(&self, other: &Walk) -> Ordering {
        self.covered
            .cmp(&other.covered)
            .then_with(|| self.verified().cmp(&other.verified()))
            .then_with(|| self.steps.len().cmp(&other.steps.len()))
            .then_with(|| other.frames().cmp(&self.frames()))
    }
}

type MemoKey = (usize, FrameIndex, Mask, usize);

/// Greedy walker with bounded lookahead over one edge graph.
struct Walker<'a> {
    graph: &'a EdgeGraph,
    config: &'a SearchConfig,
}

impl<'a> Walker<'a> {
    /// Most new streams reachable from `cur` after `after` within `depth` cuts.
    ///
    /// The flag is false when the budget ran out below this node; such
    /// scores are lower bounds and stay out of the memo.
    fn reach(
        &self,
        cur: usize,
        after: FrameIndex,
        mask: Mask,
        depth: usize,
        memo: &mut HashMap<MemoKey, usize>,
        budget: &mut usize,
    ) -> (usize, bool) {
        let remaining = self.graph.n - mask.count_ones() as usize;
        if depth == 0 || remaining == 0 {
            return (0, true);
        }
        let key = (cur, after, mask, depth);
        if let Some(&known) = memo.get(&key) {
            return (known, true);
        }
        if *budget == 0 {
            return (0, false);
        }
        *budget -= 1;

        let mut best = 0;
        let mut exact = true;
        for to in 0..self.graph.n {
            if to == cur {
                continue;
            }
            let seen = mask & bit(to) != 0;
            if seen && !self.config.allow_revisits {
                continue;
            }
            let Some((frame, _)) = self.graph.earliest(cur, to, Some(after)) else {
                continue;
            };
            let gain = usize::from(!seen);
            let (further, complete) =
                self.reach(to, frame, mask | bit(to), depth - 1, memo, budget);
            exact &= complete;
            if gain + further > best {
                best = gain + further;
                if best == remaining {
                    // Nothing can beat full coverage.
                    exact = true;
                    break;
                }
            }
        }

        if exact {
            memo.insert(key, best);
        }
        (best, exact)
    }

    fn candidates(
        &self,
        cur: usize,
        after: Option<FrameIndex>,
        mask: Mask,
        rng: Option<&mut StdRng>,
    ) -> Vec<Candidate> {
        let mut raw: Vec<(usize, FrameIndex, Tier)> = Vec::new();
        for to in 0..self.graph.n {
            if to == cur || (!self.config.allow_revisits && mask & bit(to) != 0) {
                continue;
            }
            if let Some((frame, tier)) = self.graph.earliest(cur, to, after) {
                raw.push((to, frame, tier));
                if !tier.is_verified() {
                    if let Some(vframe) = self.graph.earliest_verified(cur, to, after) {
                        raw.push((to, vframe, Tier::IdentityVerified));
                    }
                }
            }
        }

        let mut memo = HashMap::new();
        let share = (self.config.max_expansions / raw.len().max(1)).max(1);
        let mut rng = rng;
        raw.into_iter()
            .map(|(to, frame, tier)| {
                let seen = mask & bit(to) != 0;
                let mut budget = share;
                let (further, _) = self.reach(
                    to,
                    frame,
                    mask | bit(to),
                    self.config.lookahead_depth,
                    &mut memo,
                    &mut budget,
                );
                let coverage = usize::from(!seen) + further;
                let tiebreak = match rng.as_deref_mut() {
                    Some(rng) => rng.random::<u64>(),
                    None => u64::MAX - to as u64,
                };
                Candidate {
                    to,
                    frame,
                    tier,
                    coverage,
                    tiebreak,
                }
            })
            .collect()
    }

    fn walk(&self, restart: usize) -> Walk {
        let mut rng = (restart > 0)
            .then(|| StdRng::seed_from_u64(self.config.seed.wrapping_add(restart as u64)));

        let mut cur = 0usize;
        let mut mask = bit(0);
        let mut after: Option<FrameIndex> = None;
        let mut steps = Vec::new();

        loop {
            let candidates = self.candidates(cur, after, mask, rng.as_mut());
            let Some(best) = candidates.iter().max_by(|a, b| a.rank().cmp(&b.rank())) else {
                break;
            };
            debug!(
                restart = restart,
                from = cur,
                to = best.to,
                frame = best.frame,
                tier = %best.tier,
                coverage = best.coverage,
                options = candidates.len(),
                "Selected cut"
            );
            steps.push(Step {
                from: cur,
                to: best.to,
                frame: best.frame,
                tier: best.tier,
            });
            mask |= bit(best.to);
            cur = best.to;
            after = Some(best.frame);
        }

        Walk {
            steps,
            covered: mask.count_ones() as usize,
        }
    }
}

/// Builds the transformation order from filtered correspondences.
#[derive(Debug, Clone, Default)]
pub struct TransformationOrderSearch {
    config: SearchConfig,
}

impl TransformationOrderSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search for the best chain starting at `streams[0]`.
    ///
    /// # Errors
    /// `InvalidInput` when `streams` is empty or has duplicates,
    /// `TooManyStreams` above [`MAX_STREAMS`].
    pub fn search(
        &self,
        filtered: &FilteredCorrespondence,
        streams: &[StreamId],
    ) -> StitchResult<SearchOutcome> {
        self.run(filtered, streams, None)
    }

    /// Search over `streams` in metadata order, skipping cuts that would land
    /// past the end of either stream.
    ///
    /// # Errors
    /// As [`search`](Self::search).
    pub fn search_within(
        &self,
        filtered: &FilteredCorrespondence,
        streams: &[StreamMetadata],
    ) -> StitchResult<SearchOutcome> {
        let ids: Vec<StreamId> = streams.iter().map(|m| m.stream_id.clone()).collect();
        self.run(filtered, &ids, Some(streams))
    }

    fn run(
        &self,
        filtered: &FilteredCorrespondence,
        streams: &[StreamId],
        bounds: Option<&[StreamMetadata]>,
    ) -> StitchResult<SearchOutcome> {
        if streams.is_empty() {
            return Err(StitchError::invalid_input("no streams supplied to search"));
        }
        if streams.len() > MAX_STREAMS {
            return Err(StitchError::TooManyStreams {
                count: streams.len(),
                max: MAX_STREAMS,
            });
        }
        let mut index_of: HashMap<&StreamId, usize> = HashMap::with_capacity(streams.len());
        for (i, stream) in streams.iter().enumerate() {
            if index_of.insert(stream, i).is_some() {
                return Err(StitchError::invalid_input(format!(
                    "stream {} supplied more than once",
                    stream
                )));
            }
        }

        counter!("pcut_search_runs_total").increment(1);

        if filtered.is_empty() || streams.len() < 2 {
            return Ok(self.no_viable(streams));
        }

        let graph = EdgeGraph::build(filtered, &index_of, bounds);
        let walker = Walker {
            graph: &graph,
            config: &self.config,
        };

        let restarts = self.config.exploration_budget.max(1);
        let mut best: Option<Walk> = None;
        for restart in 0..restarts {
            let walk = walker.walk(restart);
            let improves = best
                .as_ref()
                .map_or(true, |b| walk.compare(b) == Ordering::Greater);
            if improves {
                debug!(
                    restart = restart,
                    covered = walk.covered,
                    cuts = walk.steps.len(),
                    "New best chain"
                );
                best = Some(walk);
            }
        }

        let Some(best) = best.filter(|w| !w.steps.is_empty()) else {
            return Ok(self.no_viable(streams));
        };

        let order = self.to_order(&best, filtered, streams);
        histogram!("pcut_search_chain_length").record(order.len() as f64);
        info!(
            streams = streams.len(),
            covered = best.covered,
            cuts = order.len(),
            verified_cuts = order.verified_count(),
            restarts = restarts,
            "Transformation order selected"
        );
        Ok(SearchOutcome::Chain(order))
    }

    fn no_viable(&self, streams: &[StreamId]) -> SearchOutcome {
        counter!("pcut_search_no_viable_total").increment(1);
        info!(
            streams = streams.len(),
            "No viable transitions; first stream plays alone"
        );
        SearchOutcome::NoViableTransitions
    }

    fn to_order(
        &self,
        walk: &Walk,
        filtered: &FilteredCorrespondence,
        streams: &[StreamId],
    ) -> TransformationOrder {
        let events = walk
            .steps
            .iter()
            .map(|step| {
                let from = streams[step.from].clone();
                let to = streams[step.to].clone();
                let alignment = StreamPair::new(from.clone(), to.clone())
                    .ok()
                    .and_then(|pair| {
                        filtered.alignment(step.frame, &pair).map(|a| {
                            if pair.is_first(&from) {
                                a
                            } else {
                                a.swapped()
                            }
                        })
                    })
                    .unwrap_or_default();
                TransitionEvent::new(step.frame, from, to)
                    .with_alignment(alignment)
                    .with_tier(step.tier)
            })
            .collect();
        TransformationOrder::new(events)
    }
}

/// Convenience wrapper: search with `config`, falling back to an empty order.
pub fn find_transformation_order(
    filtered: &FilteredCorrespondence,
    streams: &[StreamId],
    config: SearchConfig,
) -> StitchResult<SearchOutcome> {
    TransformationOrderSearch::new(config).search(filtered, streams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FilteredFrame;
    use pcut_models::AlignmentPair;

    fn id(s: &str) -> StreamId {
        StreamId::new(s)
    }

    fn ids(names: &[&str]) -> Vec<StreamId> {
        names.iter().map(|s| id(s)).collect()
    }

    fn frame(frame: FrameIndex, pairs: &[(&str, &str)], tier: Tier) -> FilteredFrame {
        FilteredFrame {
            frame,
            pairs: pairs
                .iter()
                .map(|(a, b)| StreamPair::new(id(a), id(b)).unwrap())
                .collect(),
            tier,
        }
    }

    fn hops(order: &TransformationOrder) -> Vec<(FrameIndex, String, String)> {
        order
            .events()
            .iter()
            .map(|e| (e.frame, e.from_stream.to_string(), e.to_stream.to_string()))
            .collect()
    }

    #[test]
    fn test_single_candidate_two_streams() {
        let filtered =
            FilteredCorrespondence::from_frames(vec![frame(150, &[("a", "b")], Tier::PoseOnly)]);
        let outcome = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["a", "b"]))
            .unwrap();
        let order = outcome.order().unwrap();
        assert_eq!(hops(order), vec![(150, "a".into(), "b".into())]);
        assert_eq!(order.events()[0].tier, Some(Tier::PoseOnly));
        assert!(order.events()[0].alignment.is_zero());
    }

    #[test]
    fn test_empty_correspondence_is_no_viable() {
        let outcome = TransformationOrderSearch::default()
            .search(&FilteredCorrespondence::default(), &ids(&["a", "b", "c"]))
            .unwrap();
        assert_eq!(outcome, SearchOutcome::NoViableTransitions);
        assert!(outcome.into_order().is_empty());
    }

    #[test]
    fn test_no_edge_from_first_stream_is_no_viable() {
        let filtered =
            FilteredCorrespondence::from_frames(vec![frame(10, &[("b", "c")], Tier::PoseOnly)]);
        let outcome = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["a", "b", "c"]))
            .unwrap();
        assert!(!outcome.is_viable());
    }

    #[test]
    fn test_no_streams_is_input_error() {
        let err = TransformationOrderSearch::default()
            .search(&FilteredCorrespondence::default(), &[])
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_duplicate_streams_rejected() {
        let err = TransformationOrderSearch::default()
            .search(&FilteredCorrespondence::default(), &ids(&["a", "a"]))
            .unwrap_err();
        assert!(matches!(err, StitchError::InvalidInput(_)));
    }

    #[test]
    fn test_earlier_frame_excluded_after_later_cut() {
        // c -> a happens at 95, so a -> b can only use frame 100.
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(90, &[("a", "b")], Tier::PoseOnly),
            frame(95, &[("c", "a")], Tier::PoseOnly),
            frame(100, &[("a", "b")], Tier::PoseOnly),
        ]);
        let order = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["c", "a", "b"]))
            .unwrap()
            .into_order();
        assert_eq!(
            hops(&order),
            vec![(95, "c".into(), "a".into()), (100, "a".into(), "b".into())]
        );
    }

    #[test]
    fn test_coverage_beats_earliest_frame() {
        // a -> b at 10 dead-ends; a -> c at 20 then c -> d at 30 reaches d.
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(10, &[("a", "b")], Tier::PoseOnly),
            frame(20, &[("a", "c")], Tier::PoseOnly),
            frame(30, &[("c", "d")], Tier::PoseOnly),
        ]);
        let order = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["a", "b", "c", "d"]))
            .unwrap()
            .into_order();
        assert_eq!(
            hops(&order),
            vec![(20, "a".into(), "c".into()), (30, "c".into(), "d".into())]
        );
    }

    #[test]
    fn test_small_expansion_cap_keeps_coverage_ranking() {
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(10, &[("a", "b")], Tier::PoseOnly),
            frame(20, &[("a", "c")], Tier::PoseOnly),
            frame(30, &[("c", "d")], Tier::PoseOnly),
            frame(40, &[("d", "e")], Tier::PoseOnly),
        ]);
        let config = SearchConfig::default()
            .with_exploration_budget(1)
            .with_max_expansions(1);
        let order = TransformationOrderSearch::new(config)
            .search(&filtered, &ids(&["a", "b", "c", "d", "e"]))
            .unwrap()
            .into_order();
        assert_eq!(order.frames(), vec![20, 30, 40]);
        assert_eq!(order.covered_streams().len(), 4);
    }

    #[test]
    fn test_cut_past_shorter_stream_dropped() {
        // Frame 150 is 5 s on a's timebase, past b's 4 s end.
        let streams = vec![
            StreamMetadata::new("a", "a.mp4", 30.0, 10.0),
            StreamMetadata::new("b", "b.mp4", 60.0, 4.0),
            StreamMetadata::new("c", "c.mp4", 30.0, 10.0),
        ];
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(150, &[("b", "a")], Tier::PoseOnly),
            frame(200, &[("a", "c")], Tier::PoseOnly),
        ]);
        let search = TransformationOrderSearch::default();

        let unbounded = search.search(&filtered, &ids(&["a", "b", "c"])).unwrap();
        assert_eq!(unbounded.into_order().frames()[0], 150);

        let order = search.search_within(&filtered, &streams).unwrap().into_order();
        assert_eq!(hops(&order), vec![(200, "a".into(), "c".into())]);
    }

    #[test]
    fn test_every_cut_out_of_bounds_is_no_viable() {
        let streams = vec![
            StreamMetadata::new("a", "a.mp4", 30.0, 10.0),
            StreamMetadata::new("b", "b.mp4", 60.0, 4.0),
        ];
        let filtered =
            FilteredCorrespondence::from_frames(vec![frame(150, &[("b", "a")], Tier::PoseOnly)]);
        let outcome = TransformationOrderSearch::default()
            .search_within(&filtered, &streams)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::NoViableTransitions);
    }

    #[test]
    fn test_verified_preferred_when_coverage_ties() {
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(10, &[("a", "b")], Tier::PoseOnly),
            frame(20, &[("a", "c")], Tier::IdentityVerified),
            frame(30, &[("b", "c")], Tier::PoseOnly),
        ]);
        let order = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["a", "b", "c"]))
            .unwrap()
            .into_order();
        assert_eq!(
            hops(&order),
            vec![(20, "a".into(), "c".into()), (30, "c".into(), "b".into())]
        );
        assert_eq!(order.verified_count(), 1);
    }

    #[test]
    fn test_later_verified_edge_to_same_target() {
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(10, &[("a", "b")], Tier::PoseOnly),
            frame(40, &[("a", "b")], Tier::IdentityVerified),
        ]);
        let order = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["a", "b"]))
            .unwrap()
            .into_order();
        assert_eq!(hops(&order), vec![(40, "a".into(), "b".into())]);
    }

    #[test]
    fn test_tie_broken_by_caller_order() {
        let filtered = FilteredCorrespondence::from_frames(vec![frame(
            10,
            &[("a", "b"), ("a", "c")],
            Tier::PoseOnly,
        )]);
        let config = SearchConfig::default().with_exploration_budget(1);
        let order = TransformationOrderSearch::new(config)
            .search(&filtered, &ids(&["a", "c", "b"]))
            .unwrap()
            .into_order();
        assert_eq!(hops(&order), vec![(10, "a".into(), "c".into())]);
    }

    #[test]
    fn test_no_revisit_by_default() {
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(10, &[("a", "b")], Tier::PoseOnly),
            frame(20, &[("a", "b")], Tier::PoseOnly),
        ]);
        let order = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["a", "b"]))
            .unwrap()
            .into_order();
        assert_eq!(order.len(), 1);
    }

    #[test]
    fn test_revisits_when_allowed() {
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(10, &[("a", "b")], Tier::PoseOnly),
            frame(20, &[("a", "b")], Tier::PoseOnly),
        ]);
        let order = TransformationOrderSearch::new(SearchConfig::default().with_revisits(true))
            .search(&filtered, &ids(&["a", "b"]))
            .unwrap()
            .into_order();
        assert_eq!(
            hops(&order),
            vec![(10, "a".into(), "b".into()), (20, "b".into(), "a".into())]
        );
    }

    #[test]
    fn test_alignment_oriented_to_direction() {
        let pair = StreamPair::new(id("a"), id("b")).unwrap();
        let filtered =
            FilteredCorrespondence::from_frames(vec![frame(10, &[("a", "b")], Tier::PoseOnly)])
                .with_alignment(10, pair, AlignmentPair::new([1.0; 4], [2.0; 4]));
        let order = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["b", "a"]))
            .unwrap()
            .into_order();
        // b -> a: vector1 belongs to b, the canonical second member
        assert_eq!(order.events()[0].alignment.vector1, [2.0; 4]);
        assert_eq!(order.events()[0].alignment.vector2, [1.0; 4]);
    }

    #[test]
    fn test_same_seed_same_order() {
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(5, &[("a", "b"), ("a", "c"), ("a", "d")], Tier::PoseOnly),
            frame(9, &[("b", "c"), ("c", "d"), ("b", "d")], Tier::PoseOnly),
        ]);
        let streams = ids(&["a", "b", "c", "d"]);
        let config = SearchConfig::default().with_seed(7);
        let first = find_transformation_order(&filtered, &streams, config.clone()).unwrap();
        let second = find_transformation_order(&filtered, &streams, config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_streams_ignored() {
        let filtered = FilteredCorrespondence::from_frames(vec![
            frame(5, &[("a", "ghost")], Tier::PoseOnly),
            frame(8, &[("a", "b")], Tier::PoseOnly),
        ]);
        let order = TransformationOrderSearch::default()
            .search(&filtered, &ids(&["a", "b"]))
            .unwrap()
            .into_order();
        assert_eq!(hops(&order), vec![(8, "a".into(), "b".into())]);
    }
}
