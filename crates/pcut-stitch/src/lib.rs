//! Transition selection for multi-camera stitching.
//!
//! This crate provides:
//! - A per-frame index of pose-compatible stream pairs
//! - Identity filtering with graceful fallback to pose-only candidates
//! - The transformation order search (bounded lookahead, seeded restarts)
//! - Order validation for searched and caller-supplied orders
//! - Timeline assembly for the renderer

pub mod assemble;
pub mod correspondence;
pub mod error;
pub mod identity;
pub mod manual;
pub mod pipeline;
pub mod search;
pub mod validate;

pub use assemble::TimelineAssembler;
pub use correspondence::CorrespondenceIndex;
pub use error::{StitchError, StitchResult, ViolationKind};
pub use identity::{
    gate_single_subject, FilteredCorrespondence, FilteredFrame, IdentityFilter, IdentityPolicy,
};
pub use manual::{order_from_segments, resolve_video, ManualOrder};
pub use pipeline::{OrderSource, StitchOptions, StitchPlan, StitchReport, Stitcher};
pub use search::{
    find_transformation_order, SearchConfig, SearchOutcome, TransformationOrderSearch, MAX_STREAMS,
};
pub use validate::OrderValidator;
