//! Timeline rendering.
//!
//! Plays `streams[first_stream]` from 0 to the first cut, then each cut's
//! `next_stream` from that cut's timestamp to the next cut (or to the end of
//! the stream for the last segment). Segments are re-encoded with a shared
//! encoder config so the concat demuxer can join them without re-encoding.

use std::path::{Path, PathBuf};

use metrics::counter;
use pcut_models::{RenderEncodingConfig, TimelineDocument};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{copy_file, move_file};

/// Segments shorter than this are dropped from the plan.
const MIN_SEGMENT_SECS: f64 = 0.001;

/// One contiguous piece of the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlan {
    /// Position in the output
    pub index: usize,
    /// Index into the document's `streams`
    pub stream_index: usize,
    pub file: PathBuf,
    pub start: f64,
    pub end: f64,
}

impl SegmentPlan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Split a timeline into the segments to decode, in output order.
///
/// # Errors
/// `InvalidTimeline` for out-of-range stream indices or cuts that go backwards.
pub fn plan_segments(doc: &TimelineDocument) -> MediaResult<Vec<SegmentPlan>> {
    let stream = |index: usize| {
        doc.streams.get(index).ok_or_else(|| {
            MediaError::invalid_timeline(format!(
                "stream index {} out of range ({} streams)",
                index,
                doc.streams.len()
            ))
        })
    };

    let mut plans = Vec::with_capacity(doc.cross_points.len() + 1);
    let mut active = doc.meta_info.first_stream;
    let mut start = 0.0_f64;

    let boundaries = doc
        .cross_points
        .iter()
        .map(|c| (Some(c.time_stamp), Some(c.next_stream)))
        .chain(std::iter::once((None, None)));

    for (cut, next) in boundaries {
        let source = stream(active)?;
        let end = cut.unwrap_or(source.end);
        if !end.is_finite() || end + MIN_SEGMENT_SECS < start {
            return Err(MediaError::invalid_timeline(format!(
                "cut at {:.3}s precedes previous cut at {:.3}s",
                end, start
            )));
        }
        if end - start >= MIN_SEGMENT_SECS {
            plans.push(SegmentPlan {
                index: plans.len(),
                stream_index: active,
                file: source.file.clone(),
                start,
                end,
            });
        } else {
            warn!(stream = active, start = start, "Skipping empty segment");
        }
        if let Some(next) = next {
            stream(next)?;
            active = next;
        }
        start = end;
    }

    Ok(plans)
}

/// Body of a concat demuxer list for `paths`.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

/// What a render produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub output: PathBuf,
    pub segments: usize,
    /// The opening stream was copied unmodified
    pub passthrough: bool,
}

/// Renders timeline documents through FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct TimelineRenderer {
    encoding: RenderEncodingConfig,
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl TimelineRenderer {
    pub fn new(encoding: RenderEncodingConfig) -> Self {
        Self {
            encoding,
            timeout_secs: None,
            cancel_rx: None,
        }
    }

    /// Per-command timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }

    /// Render `doc` to `output`.
    pub async fn render(&self, doc: &TimelineDocument, output: &Path) -> MediaResult<RenderSummary> {
        self.encoding.validate().map_err(MediaError::InvalidConfig)?;

        if doc.is_passthrough() {
            let source = doc.streams.get(doc.meta_info.first_stream).ok_or_else(|| {
                MediaError::invalid_timeline("opening stream missing from timeline")
            })?;
            info!(
                source = %source.file.display(),
                output = %output.display(),
                "No cross points; passing opening stream through"
            );
            copy_file(&source.file, output).await?;
            counter!("pcut_render_passthrough_total").increment(1);
            return Ok(RenderSummary {
                output: output.to_path_buf(),
                segments: 1,
                passthrough: true,
            });
        }

        let plans = plan_segments(doc)?;
        if plans.is_empty() {
            return Err(MediaError::invalid_timeline("timeline has no playable segments"));
        }

        let scratch = tempfile::tempdir()?;
        let runner = self.runner();
        let mut parts = Vec::with_capacity(plans.len());

        for plan in &plans {
            let part = scratch.path().join(format!("segment_{:03}.mp4", plan.index));
            debug!(
                segment = plan.index,
                stream = plan.stream_index,
                start = plan.start,
                end = plan.end,
                "Extracting segment"
            );
            let cmd = FfmpegCommand::new(&plan.file, &part)
                .seek(plan.start)
                .duration(plan.duration())
                .encoding(&self.encoding);
            runner.run(&cmd).await?;
            counter!("pcut_render_segments_total").increment(1);
            parts.push(part);
        }

        let list = scratch.path().join("concat.txt");
        tokio::fs::write(&list, concat_list(&parts)).await?;

        let joined = scratch.path().join("joined.mp4");
        let cmd = FfmpegCommand::new(&list, &joined)
            .concat_demuxer()
            .stream_copy();
        runner.run(&cmd).await?;
        move_file(&joined, output).await?;

        info!(
            segments = plans.len(),
            output = %output.display(),
            "Timeline rendered"
        );
        Ok(RenderSummary {
            output: output.to_path_buf(),
            segments: plans.len(),
            passthrough: false,
        })
    }
}
