//! Caller-supplied orders.
//!
//! A hand-edited sequence lists which video plays from which second. The
//! first entry is the opening stream; every later entry is a cut into its
//! video at `start` seconds on the timebase of the video playing before it.

use pcut_models::{ManualSegment, StreamId, StreamMetadata, TransformationOrder, TransitionEvent};
use tracing::info;

use crate::error::{StitchError, StitchResult};
use crate::validate::OrderValidator;

/// A validated manual order and the stream list it was validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualOrder {
    /// Streams with the sequence's opening stream moved to the front
    pub streams: Vec<StreamMetadata>,
    pub order: TransformationOrder,
}

/// Find the stream a sequence entry names, by id, file name or file stem.
pub fn resolve_video<'a>(
    video: &str,
    metadata: &'a [StreamMetadata],
) -> Option<&'a StreamMetadata> {
    metadata
        .iter()
        .find(|m| m.stream_id.as_str() == video)
        .or_else(|| {
            metadata.iter().find(|m| {
                m.file_path.file_name().is_some_and(|n| n == video)
                    || m.file_path.file_stem().is_some_and(|n| n == video)
            })
        })
}

/// Convert a manual sequence into a validated transformation order.
///
/// # Errors
/// `InvalidInput` for an empty sequence or a bad start time,
/// `UnknownStream` for a video that is not in `metadata`, and
/// `InvariantViolation` when the resulting order breaks an ordering rule.
pub fn order_from_segments(
    segments: &[ManualSegment],
    metadata: &[StreamMetadata],
    allow_revisits: bool,
) -> StitchResult<ManualOrder> {
    if segments.is_empty() {
        return Err(StitchError::invalid_input("manual sequence is empty"));
    }

    let mut resolved = Vec::with_capacity(segments.len());
    for segment in segments {
        if !segment.start.is_finite() || segment.start < 0.0 {
            return Err(StitchError::invalid_input(format!(
                "start of {} must be a non-negative number of seconds, got {}",
                segment.video, segment.start
            )));
        }
        let stream = resolve_video(&segment.video, metadata)
            .ok_or_else(|| StitchError::UnknownStream(segment.video.clone()))?;
        resolved.push(stream);
    }

    let events: Vec<TransitionEvent> = resolved
        .windows(2)
        .zip(segments.iter().skip(1))
        .map(|(pair, segment)| {
            let (active, next) = (pair[0], pair[1]);
            TransitionEvent::new(
                active.seconds_to_frame(segment.start),
                active.stream_id.clone(),
                next.stream_id.clone(),
            )
        })
        .collect();
    let order = TransformationOrder::new(events);

    let streams = opening_first(metadata, &resolved[0].stream_id);
    OrderValidator::with_metadata(&streams)
        .allow_revisits(allow_revisits)
        .validate(&order)?;

    info!(
        segments = segments.len(),
        cuts = order.len(),
        opening = %resolved[0].stream_id,
        "Manual order accepted"
    );
    Ok(ManualOrder { streams, order })
}

/// Reorder `metadata` so `opening` comes first, keeping the rest in place.
fn opening_first(metadata: &[StreamMetadata], opening: &StreamId) -> Vec<StreamMetadata> {
    let mut streams = Vec::with_capacity(metadata.len());
    streams.extend(metadata.iter().filter(|m| &m.stream_id == opening).cloned());
    streams.extend(metadata.iter().filter(|m| &m.stream_id != opening).cloned());
    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViolationKind;

    fn metadata() -> Vec<StreamMetadata> {
        vec![
            StreamMetadata::new("a", "/videos/a.mp4", 30.0, 10.0),
            StreamMetadata::new("b", "/videos/b.mp4", 25.0, 10.0),
            StreamMetadata::new("c", "/videos/c.mov", 30.0, 10.0),
        ]
    }

    #[test]
    fn test_single_entry_is_passthrough() {
        let manual =
            order_from_segments(&[ManualSegment::new("b", 0.0)], &metadata(), false).unwrap();
        assert!(manual.order.is_empty());
        assert_eq!(manual.streams[0].stream_id.as_str(), "b");
    }

    #[test]
    fn test_frames_use_active_stream_rate() {
        let segments = vec![
            ManualSegment::new("a.mp4", 0.0),
            ManualSegment::new("b", 2.5),
            ManualSegment::new("c", 4.1),
        ];
        let manual = order_from_segments(&segments, &metadata(), false).unwrap();
        let events = manual.order.events();
        // a plays at 30 fps, b at 25 fps
        assert_eq!(events[0].frame, 75);
        assert_eq!(events[1].frame, 102);
        assert_eq!(events[1].from_stream.as_str(), "b");
        assert_eq!(events[1].to_stream.as_str(), "c");
    }

    #[test]
    fn test_unknown_video_rejected() {
        let segments = vec![ManualSegment::new("a", 0.0), ManualSegment::new("zzz", 1.0)];
        let err = order_from_segments(&segments, &metadata(), false).unwrap_err();
        assert!(matches!(err, StitchError::UnknownStream(name) if name == "zzz"));
    }

    #[test]
    fn test_out_of_order_starts_rejected() {
        let segments = vec![
            ManualSegment::new("a", 0.0),
            ManualSegment::new("b", 5.0),
            ManualSegment::new("c", 1.0),
        ];
        let err = order_from_segments(&segments, &metadata(), false).unwrap_err();
        assert!(matches!(
            err,
            StitchError::InvariantViolation {
                index: 1,
                kind: ViolationKind::NonIncreasingFrame { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_revisit_follows_flag() {
        let segments = vec![
            ManualSegment::new("a", 0.0),
            ManualSegment::new("b", 1.0),
            ManualSegment::new("a", 2.0),
        ];
        assert!(order_from_segments(&segments, &metadata(), false).is_err());
        assert!(order_from_segments(&segments, &metadata(), true).is_ok());
    }

    #[test]
    fn test_negative_start_rejected() {
        let segments = vec![ManualSegment::new("a", 0.0), ManualSegment::new("b", -1.0)];
        let err = order_from_segments(&segments, &metadata(), false).unwrap_err();
        assert!(err.is_input_error());
    }
}
