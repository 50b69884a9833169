//! Batch worker for multi-camera stitching.
//!
//! Two stages share an on-disk snapshot:
//! - `analyze` merges per-stream analysis artifacts into an [`AnalysisSnapshot`]
//! - `render` stitches the snapshot into a timeline and optionally a video
//!
//! [`AnalysisSnapshot`]: pcut_models::AnalysisSnapshot

pub mod analysis;
pub mod config;
pub mod error;
pub mod logging;
pub mod render_job;
pub mod snapshot_store;

pub use analysis::{analyze, discover_videos, VERIFIED_MATCHES_FILE, VIDEO_EXTENSIONS};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::RunLogger;
pub use render_job::{
    load_sequence, run_render, RenderOptions, RenderOutput, RunReport, OUTPUT_VIDEO, REPORT_FILE,
    TIMELINE_FILE,
};
pub use snapshot_store::{load_snapshot, save_snapshot, SNAPSHOT_FILE};
