//! FFprobe stream metadata.

use pcut_models::{StreamId, StreamMetadata};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult, Tool};

/// Video file information.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Frame rate (fps)
    pub fps: f64,
    /// Frame count reported by the container, if any
    pub nb_frames: Option<u64>,
    /// Video codec
    pub codec: String,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new(Tool::Ffprobe.binary())
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(
            MediaError::tool_failed(Tool::Ffprobe, path, output.status.code())
                .with_stderr(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        );
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| MediaError::InvalidVideo("Frame rate unavailable".to_string()))?;

    Ok(VideoInfo {
        duration,
        fps,
        nb_frames: video.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        codec: video.codec_name.clone().unwrap_or_default(),
    })
}

/// Probe `path` and describe it as stream metadata.
pub async fn probe_metadata(
    stream_id: StreamId,
    path: impl AsRef<Path>,
) -> MediaResult<StreamMetadata> {
    let path = path.as_ref();
    let info = probe_video(path).await?;
    if info.duration <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "{} reports no duration",
            path.display()
        )));
    }

    let mut metadata = StreamMetadata::new(stream_id, path, info.fps, info.duration);
    if let Some(frames) = info.nb_frames.filter(|n| *n > 0) {
        metadata.total_frames = frames;
    }
    debug!(
        stream = %metadata.stream_id,
        fps = metadata.frame_rate,
        duration = metadata.duration,
        frames = metadata.total_frames,
        codec = %info.codec,
        "Probed stream"
    );
    Ok(metadata)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}
