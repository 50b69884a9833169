//! Transformation order validation.
//!
//! Every order is checked before assembly, whether it came from the search or
//! from a caller. The first broken rule halts with the offending event.

use std::collections::{HashMap, HashSet};

use pcut_models::{FrameIndex, StreamId, StreamMetadata, TransformationOrder};
use tracing::debug;

use crate::error::{StitchError, StitchResult, ViolationKind};

/// Checks the ordering rules of a transformation order.
#[derive(Debug, Clone)]
pub struct OrderValidator<'a> {
    streams: Vec<&'a StreamId>,
    allow_revisits: bool,
    metadata: HashMap<&'a StreamId, &'a StreamMetadata>,
}

impl<'a> OrderValidator<'a> {
    /// Validator over a plain stream list; the opening stream is `streams[0]`.
    pub fn new(streams: &'a [StreamId]) -> Self {
        Self {
            streams: streams.iter().collect(),
            allow_revisits: false,
            metadata: HashMap::new(),
        }
    }

    /// Validator that also bounds cuts by each stream's length.
    pub fn with_metadata(metadata: &'a [StreamMetadata]) -> Self {
        Self {
            streams: metadata.iter().map(|m| &m.stream_id).collect(),
            allow_revisits: false,
            metadata: metadata.iter().map(|m| (&m.stream_id, m)).collect(),
        }
    }

    pub fn allow_revisits(mut self, allow: bool) -> Self {
        self.allow_revisits = allow;
        self
    }

    pub fn validate(&self, order: &TransformationOrder) -> StitchResult<()> {
        let Some(&opening) = self.streams.first() else {
            return Err(StitchError::invalid_input("no streams supplied"));
        };
        let known: HashSet<&StreamId> = self.streams.iter().copied().collect();

        let mut active = opening;
        let mut previous: Option<FrameIndex> = None;
        let mut played: HashSet<&StreamId> = HashSet::from([opening]);

        for (index, event) in order.events().iter().enumerate() {
            let fail = |kind| Err(StitchError::violation(index, event.frame, kind));

            for stream in [&event.from_stream, &event.to_stream] {
                if !known.contains(stream) {
                    return fail(ViolationKind::UnknownStream(stream.clone()));
                }
            }
            if event.from_stream == event.to_stream {
                return fail(ViolationKind::SelfCut);
            }
            if &event.from_stream != active {
                let kind = if index == 0 {
                    ViolationKind::WrongInitialStream {
                        expected: active.clone(),
                        found: event.from_stream.clone(),
                    }
                } else {
                    ViolationKind::BrokenChain {
                        expected: active.clone(),
                        found: event.from_stream.clone(),
                    }
                };
                return fail(kind);
            }
            if let Some(previous) = previous {
                if event.frame <= previous {
                    return fail(ViolationKind::NonIncreasingFrame { previous });
                }
            }
            if !self.allow_revisits && played.contains(&event.to_stream) {
                return fail(ViolationKind::Revisit(event.to_stream.clone()));
            }
            if let Some(stream) = self.beyond_end(event.frame, active, &event.to_stream) {
                return fail(ViolationKind::FrameBeyondStream { stream });
            }

            played.insert(&event.to_stream);
            active = &event.to_stream;
            previous = Some(event.frame);
        }

        debug!(cuts = order.len(), "Transformation order valid");
        Ok(())
    }

    /// The stream a cut at `frame` would run past, if any.
    fn beyond_end(&self, frame: FrameIndex, from: &StreamId, to: &StreamId) -> Option<StreamId> {
        let source = self.metadata.get(from)?;
        if source.total_frames > 0 && frame > source.total_frames {
            return Some(from.clone());
        }
        let target = self.metadata.get(to)?;
        cut_beyond_end(frame, source, target).cloned()
    }
}

/// The stream a cut from `source` to `target` at `frame` would run past.
///
/// `frame` is on the source timebase. Zero frame counts and durations mean
/// the bound is unknown and never fail.
pub(crate) fn cut_beyond_end<'m>(
    frame: FrameIndex,
    source: &'m StreamMetadata,
    target: &'m StreamMetadata,
) -> Option<&'m StreamId> {
    if source.total_frames > 0 && frame > source.total_frames {
        return Some(&source.stream_id);
    }
    let seconds = source.frame_to_seconds(frame);
    if target.duration > 0.0 && seconds > target.duration {
        return Some(&target.stream_id);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcut_models::TransitionEvent;

    fn ids(names: &[&str]) -> Vec<StreamId> {
        names.iter().map(|s| StreamId::new(*s)).collect()
    }

    fn order(events: &[(FrameIndex, &str, &str)]) -> TransformationOrder {
        TransformationOrder::new(
            events
                .iter()
                .map(|(f, a, b)| TransitionEvent::new(*f, *a, *b))
                .collect(),
        )
    }

    fn kind(err: StitchError) -> (usize, ViolationKind) {
        match err {
            StitchError::InvariantViolation { index, kind, .. } => (index, kind),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_chain() {
        let streams = ids(&["a", "b", "c"]);
        let v = OrderValidator::new(&streams);
        assert!(v.validate(&order(&[(10, "a", "b"), (20, "b", "c")])).is_ok());
        assert!(v.validate(&TransformationOrder::empty()).is_ok());
    }

    #[test]
    fn test_non_increasing_frame() {
        let streams = ids(&["a", "b", "c"]);
        let err = OrderValidator::new(&streams)
            .validate(&order(&[(100, "a", "b"), (90, "b", "c")]))
            .unwrap_err();
        assert_eq!(kind(err), (1, ViolationKind::NonIncreasingFrame { previous: 100 }));
    }

    #[test]
    fn test_broken_chain() {
        let streams = ids(&["a", "b", "c"]);
        let err = OrderValidator::new(&streams)
            .validate(&order(&[(10, "a", "b"), (20, "a", "c")]))
            .unwrap_err();
        let (index, kind) = kind(err);
        assert_eq!(index, 1);
        assert!(matches!(kind, ViolationKind::BrokenChain { .. }));
    }

    #[test]
    fn test_wrong_initial_stream() {
        let streams = ids(&["a", "b"]);
        let err = OrderValidator::new(&streams)
            .validate(&order(&[(10, "b", "a")]))
            .unwrap_err();
        assert!(matches!(kind(err).1, ViolationKind::WrongInitialStream { .. }));
    }

    #[test]
    fn test_revisit_rejected_unless_allowed() {
        let streams = ids(&["a", "b"]);
        let o = order(&[(10, "a", "b"), (20, "b", "a")]);
        let err = OrderValidator::new(&streams).validate(&o).unwrap_err();
        assert_eq!(kind(err).1, ViolationKind::Revisit(StreamId::new("a")));
        assert!(OrderValidator::new(&streams)
            .allow_revisits(true)
            .validate(&o)
            .is_ok());
    }

    #[test]
    fn test_unknown_and_self_cut() {
        let streams = ids(&["a", "b"]);
        let err = OrderValidator::new(&streams)
            .validate(&order(&[(10, "a", "z")]))
            .unwrap_err();
        assert_eq!(kind(err).1, ViolationKind::UnknownStream(StreamId::new("z")));

        let err = OrderValidator::new(&streams)
            .validate(&order(&[(10, "a", "a")]))
            .unwrap_err();
        assert_eq!(kind(err).1, ViolationKind::SelfCut);
    }

    #[test]
    fn test_cut_beyond_stream_end() {
        let metadata = vec![
            StreamMetadata::new("a", "a.mp4", 30.0, 10.0),
            StreamMetadata::new("b", "b.mp4", 30.0, 4.0),
        ];
        let v = OrderValidator::with_metadata(&metadata);
        // a has 300 frames
        let err = v.validate(&order(&[(301, "a", "b")])).unwrap_err();
        assert_eq!(
            kind(err).1,
            ViolationKind::FrameBeyondStream { stream: StreamId::new("a") }
        );
        // 150 / 30 = 5s, but b is only 4s long
        let err = v.validate(&order(&[(150, "a", "b")])).unwrap_err();
        assert_eq!(
            kind(err).1,
            ViolationKind::FrameBeyondStream { stream: StreamId::new("b") }
        );
        assert!(v.validate(&order(&[(90, "a", "b")])).is_ok());
    }

    #[test]
    fn test_no_streams_is_input_error() {
        let err = OrderValidator::new(&[])
            .validate(&TransformationOrder::empty())
            .unwrap_err();
        assert!(err.is_input_error());
    }
}
