//! Structured run logging.
//!
//! Every log line of a run carries the run id and the stage, so analyze and
//! render output of the same run can be correlated.

use std::time::Instant;

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Logger for one stage of a worker run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    stage: String,
    started: Instant,
}

impl RunLogger {
    /// Create a logger with a fresh run id.
    pub fn new(stage: &str) -> Self {
        Self::with_run_id(&Uuid::new_v4().to_string(), stage)
    }

    pub fn with_run_id(run_id: &str, stage: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
            started: Instant::now(),
        }
    }

    /// Same run, different stage.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self::with_run_id(&self.run_id, stage)
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "Stage started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, stage = %self.stage, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, stage = %self.stage, "Stage failed: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Stage completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span covering the whole stage.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id, stage = %self.stage)
    }
}
