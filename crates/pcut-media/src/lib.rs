//! FFmpeg CLI renderer for stitched timelines.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeout and cancellation via tokio
//! - Stream metadata probing through FFprobe
//! - Segment planning and concat rendering of timeline documents

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod render;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult, Tool};
pub use fs_utils::{copy_file, move_file};
pub use probe::{probe_metadata, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use render::{concat_list, plan_segments, RenderSummary, SegmentPlan, TimelineRenderer};
