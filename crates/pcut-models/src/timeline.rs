//! Timeline document consumed by the renderer.
//!
//! # Schema
//! ```json
//! {
//!   "meta_info": {
//!     "num_stream": 2,
//!     "frame_rate": 30.0,
//!     "num_frames": 300,
//!     "duration": 10.0,
//!     "num_cross": 1,
//!     "first_stream": 0
//!   },
//!   "streams": [
//!     { "file": "a.mp4", "start": 0.0, "end": 10.0, "frame_rate": 30.0 }
//!   ],
//!   "cross_points": [
//!     {
//!       "time_stamp": 5.0,
//!       "next_stream": 1,
//!       "vector_pairs": [ { "vector1": [0,0,0,0], "vector2": [0,0,0,0] } ]
//!     }
//!   ]
//! }
//! ```
//!
//! Playback starts on `streams[first_stream]` and switches to
//! `streams[next_stream]` at each cross point's `time_stamp`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::records::Vec4;
use crate::stream::FrameIndex;

/// Schema version for compatibility checking.
pub const TIMELINE_VERSION: &str = "1.0";

fn default_version() -> String {
    TIMELINE_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetaInfo {
    pub num_stream: usize,
    /// Frame rate of the opening stream
    pub frame_rate: f64,
    /// Frame count of the opening stream
    pub num_frames: u64,
    /// Duration of the opening stream in seconds
    pub duration: f64,
    pub num_cross: usize,
    pub first_stream: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineStream {
    pub file: PathBuf,
    pub start: f64,
    pub end: f64,
    pub frame_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VectorPair {
    pub vector1: Vec4,
    pub vector2: Vec4,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CrossPoint {
    /// Cut time in seconds
    pub time_stamp: f64,
    /// Index into `streams` of the stream that plays after the cut
    pub next_stream: usize,
    pub vector_pairs: Vec<VectorPair>,
}

/// Declarative cut list handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineDocument {
    #[serde(default = "default_version")]
    pub version: String,
    pub meta_info: MetaInfo,
    pub streams: Vec<TimelineStream>,
    pub cross_points: Vec<CrossPoint>,
}

impl TimelineDocument {
    /// A document without cuts plays the opening stream unmodified.
    pub fn is_passthrough(&self) -> bool {
        self.cross_points.is_empty()
    }

    /// Stream index active after each cross point, starting with the opening stream.
    pub fn active_sequence(&self) -> Vec<usize> {
        let mut seq = Vec::with_capacity(self.cross_points.len() + 1);
        seq.push(self.meta_info.first_stream);
        seq.extend(self.cross_points.iter().map(|c| c.next_stream));
        seq
    }

    /// Re-derive the cut frames as `time_stamp * frame_rate` of the stream
    /// that was active when each cut happened.
    pub fn cut_frames(&self) -> Vec<FrameIndex> {
        let mut active = self.meta_info.first_stream;
        let mut frames = Vec::with_capacity(self.cross_points.len());
        for cross in &self.cross_points {
            let fps = self
                .streams
                .get(active)
                .map(|s| s.frame_rate)
                .unwrap_or(self.meta_info.frame_rate);
            frames.push((cross.time_stamp * fps).round() as FrameIndex);
            active = cross.next_stream;
        }
        frames
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
