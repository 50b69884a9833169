//! Render stage: snapshot to timeline, report and video.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pcut_media::{RenderSummary, TimelineRenderer};
use pcut_models::{AnalysisSnapshot, ManualSegment};
use pcut_stitch::{StitchPlan, StitchReport, Stitcher};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::watch;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;

pub const TIMELINE_FILE: &str = "timeline.json";
pub const REPORT_FILE: &str = "stitch_report.json";
pub const OUTPUT_VIDEO: &str = "stitched.mp4";

/// Options for one render run.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Manual sequence replacing the search
    pub sequence: Option<Vec<ManualSegment>>,
    /// Write timeline and report only
    pub plan_only: bool,
    pub cancel_rx: Option<watch::Receiver<bool>>,
}

/// Report file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stitch: StitchReport,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub render: Option<RenderSummary>,
}

/// What a render run produced.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub plan: StitchPlan,
    pub timeline_path: PathBuf,
    pub report_path: PathBuf,
    pub render: Option<RenderSummary>,
}

/// Read a manual sequence: a JSON array of `{"video", "start"}` objects.
pub async fn load_sequence(path: &Path) -> WorkerResult<Vec<ManualSegment>> {
    let invalid = |message: String| WorkerError::InvalidSequence {
        path: path.to_path_buf(),
        message,
    };
    let bytes = fs::read(path).await.map_err(|e| invalid(e.to_string()))?;
    let segments: Vec<ManualSegment> =
        serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
    if segments.is_empty() {
        return Err(invalid("sequence is empty".to_string()));
    }
    Ok(segments)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> WorkerResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Stitch `snapshot` and write the outputs into the configured directory.
pub async fn run_render(
    config: &WorkerConfig,
    snapshot: &AnalysisSnapshot,
    options: RenderOptions,
    logger: &RunLogger,
) -> WorkerResult<RenderOutput> {
    logger.log_start(&format!(
        "snapshot {} with {} streams",
        snapshot.snapshot_id,
        snapshot.streams.len()
    ));

    let stitcher = Stitcher::new(config.stitch_options());
    let plan = stitcher
        .stitch(snapshot, options.sequence.as_deref())
        .inspect_err(|e| logger.log_error(&e.to_string()))?;

    let report = &plan.report;
    if report.viable {
        logger.log_progress(&format!(
            "{} cuts ({} verified) covering {}/{} streams",
            report.order.len(),
            report.verified_cuts,
            report.covered_streams.len(),
            report.streams.len()
        ));
    } else {
        logger.log_warning("No viable transitions; the opening stream plays alone");
    }
    let uncovered = report.uncovered_streams();
    if !uncovered.is_empty() {
        let names: Vec<&str> = uncovered.iter().map(|s| s.as_str()).collect();
        logger.log_warning(&format!("Streams never shown: {}", names.join(", ")));
    }

    fs::create_dir_all(&config.output_dir).await?;
    let timeline_path = config.output_dir.join(TIMELINE_FILE);
    write_json(&timeline_path, &plan.timeline).await?;

    let render = if options.plan_only {
        None
    } else {
        let mut renderer = TimelineRenderer::new(config.encoding.clone())
            .with_timeout(config.render_timeout.as_secs());
        if let Some(rx) = options.cancel_rx {
            renderer = renderer.with_cancel(rx);
        }
        let output = config.output_dir.join(OUTPUT_VIDEO);
        let summary = renderer
            .render(&plan.timeline, &output)
            .await
            .inspect_err(|e| logger.log_error(&e.to_string()))?;
        logger.log_progress(&format!(
            "Rendered {} segments to {}",
            summary.segments,
            summary.output.display()
        ));
        Some(summary)
    };

    let report_path = config.output_dir.join(REPORT_FILE);
    let run_report = RunReport {
        run_id: logger.run_id().to_string(),
        generated_at: Utc::now(),
        stitch: plan.report.clone(),
        render: render.clone(),
    };
    write_json(&report_path, &run_report).await?;

    logger.log_completion(&format!("timeline written to {}", timeline_path.display()));
    Ok(RenderOutput {
        plan,
        timeline_path,
        report_path,
        render,
    })
}
