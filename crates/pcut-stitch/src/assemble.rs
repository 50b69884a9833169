//! Timeline assembly.
//!
//! Projects a validated transformation order onto the declarative timeline
//! document the renderer consumes. The document is a pure function of the
//! order and the stream metadata.

use std::collections::HashMap;

use pcut_models::{
    CrossPoint, MetaInfo, StreamId, StreamMetadata, TimelineDocument, TimelineStream,
    TransformationOrder, VectorPair,
};
use tracing::debug;

use crate::error::{StitchError, StitchResult};
use crate::validate::OrderValidator;

/// Builds timeline documents from transformation orders.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineAssembler {
    allow_revisits: bool,
}

impl TimelineAssembler {
    pub fn new(allow_revisits: bool) -> Self {
        Self { allow_revisits }
    }

    /// Assemble the timeline for `order` over `streams` (opening stream first).
    ///
    /// The order is validated first; a broken order never produces a document.
    pub fn assemble(
        &self,
        order: &TransformationOrder,
        streams: &[StreamMetadata],
    ) -> StitchResult<TimelineDocument> {
        let Some(opening) = streams.first() else {
            return Err(StitchError::invalid_input("no streams supplied to assembler"));
        };
        for stream in streams {
            stream.validate()?;
        }

        OrderValidator::with_metadata(streams)
            .allow_revisits(self.allow_revisits)
            .validate(order)?;

        let position: HashMap<&StreamId, usize> = streams
            .iter()
            .enumerate()
            .map(|(i, m)| (&m.stream_id, i))
            .collect();

        let mut active = 0usize;
        let mut cross_points = Vec::with_capacity(order.len());
        for event in order.events() {
            // Validation guarantees both streams are known.
            let next = position
                .get(&event.to_stream)
                .copied()
                .ok_or_else(|| StitchError::UnknownStream(event.to_stream.to_string()))?;
            cross_points.push(CrossPoint {
                time_stamp: streams[active].frame_to_seconds(event.frame),
                next_stream: next,
                vector_pairs: vec![VectorPair {
                    vector1: event.alignment.vector1,
                    vector2: event.alignment.vector2,
                }],
            });
            active = next;
        }

        let document = TimelineDocument {
            version: pcut_models::timeline::TIMELINE_VERSION.to_string(),
            meta_info: MetaInfo {
                num_stream: streams.len(),
                frame_rate: opening.frame_rate,
                num_frames: opening.total_frames,
                duration: opening.duration,
                num_cross: cross_points.len(),
                first_stream: 0,
            },
            streams: streams
                .iter()
                .map(|m| TimelineStream {
                    file: m.file_path.clone(),
                    start: 0.0,
                    end: m.duration,
                    frame_rate: m.frame_rate,
                })
                .collect(),
            cross_points,
        };

        debug!(
            streams = document.meta_info.num_stream,
            cross_points = document.meta_info.num_cross,
            "Assembled timeline"
        );
        Ok(document)
    }
}
