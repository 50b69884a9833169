//! Analyze stage: discover videos and merge per-stream analysis artifacts.
//!
//! Each stream is loaded independently and in parallel. A stream whose
//! artifact is missing or broken is reported as a warning on the snapshot and
//! never aborts the other streams.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use pcut_models::{
    AnalysisSnapshot, AnalysisStage, PoseMatchRow, StreamAnalysisArtifact, StreamId,
    StreamMetadata, StreamWarning, VerifiedMatch,
};
use pcut_stitch::gate_single_subject;
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;

/// Container extensions picked up from the input directory.
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mkv", "mov"];

/// Verified matches written by the identity collaborator.
pub const VERIFIED_MATCHES_FILE: &str = "verified_matches.json";

/// Videos in `dir`, sorted by file name.
pub async fn discover_videos(dir: &Path) -> WorkerResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut videos = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if is_video && entry.file_type().await?.is_file() {
            videos.push(path);
        }
    }
    if videos.is_empty() {
        return Err(WorkerError::NoStreams(dir.to_path_buf()));
    }
    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(videos)
}

/// Path of the artifact for `stream` inside `artifact_dir`.
pub fn artifact_path(artifact_dir: &Path, stream: &StreamId) -> PathBuf {
    artifact_dir.join(format!("{}.json", stream))
}

/// Everything one stream contributed.
#[derive(Debug)]
struct StreamOutcome {
    stream_id: StreamId,
    metadata: Option<StreamMetadata>,
    rows: Vec<PoseMatchRow>,
    identity_eligible: bool,
    warnings: Vec<StreamWarning>,
}

impl StreamOutcome {
    fn warn(&mut self, stage: AnalysisStage, message: impl Into<String>) {
        let warning = StreamWarning::new(self.stream_id.clone(), stage, message);
        warn!(stream = %warning.stream, stage = %warning.stage, "{}", warning.message);
        counter!("pcut_analysis_stream_warnings_total").increment(1);
        self.warnings.push(warning);
    }
}

async fn read_artifact(path: &Path) -> Result<Option<StreamAnalysisArtifact>, String> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| format!("unreadable artifact {}: {}", path.display(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("cannot read {}: {}", path.display(), e)),
    }
}

async fn analyze_stream(video: PathBuf, artifact_dir: PathBuf) -> StreamOutcome {
    let stream_id = StreamId::from_path(&video);
    let mut outcome = StreamOutcome {
        stream_id: stream_id.clone(),
        metadata: None,
        rows: Vec::new(),
        identity_eligible: false,
        warnings: Vec::new(),
    };

    let artifact = match read_artifact(&artifact_path(&artifact_dir, &stream_id)).await {
        Ok(Some(artifact)) if artifact.stream_id != stream_id => {
            outcome.warn(
                AnalysisStage::PoseAnalysis,
                format!("artifact describes stream {}", artifact.stream_id),
            );
            None
        }
        Ok(Some(artifact)) => Some(artifact),
        Ok(None) => {
            outcome.warn(AnalysisStage::PoseAnalysis, "no analysis artifact");
            None
        }
        Err(message) => {
            outcome.warn(AnalysisStage::PoseAnalysis, message);
            None
        }
    };

    let mut recorded_metadata = None;
    if let Some(artifact) = artifact {
        outcome.identity_eligible = artifact.eligible_for_identity();
        if !outcome.identity_eligible {
            debug!(
                stream = %stream_id,
                people = artifact.max_people_per_frame,
                "Multi-person stream; identity verification does not apply"
            );
        }

        let total = artifact.pose_matches.len();
        outcome.rows = artifact
            .pose_matches
            .into_iter()
            .filter(|row| row.validate(&stream_id).is_ok())
            .collect();
        if outcome.rows.len() < total {
            let dropped = total - outcome.rows.len();
            outcome.warn(
                AnalysisStage::PoseAnalysis,
                format!("dropped {} malformed pose rows", dropped),
            );
        }

        match artifact.metadata.map(|m| m.validate().map(|_| m)) {
            Some(Ok(metadata)) => recorded_metadata = Some(metadata),
            Some(Err(e)) => outcome.warn(AnalysisStage::Metadata, e.to_string()),
            None => {}
        }
    }

    outcome.metadata = match recorded_metadata {
        Some(mut metadata) => {
            metadata.file_path = video.clone();
            Some(metadata)
        }
        None => match pcut_media::probe_metadata(stream_id.clone(), &video).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                outcome.warn(AnalysisStage::Metadata, e.to_string());
                None
            }
        },
    };

    if outcome.metadata.is_none() {
        outcome.rows.clear();
    }
    outcome
}

async fn read_verified(artifact_dir: &Path, logger: &RunLogger) -> Vec<VerifiedMatch> {
    let path = artifact_dir.join(VERIFIED_MATCHES_FILE);
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No verified matches; identity verification did not run");
            return Vec::new();
        }
        Err(e) => {
            logger.log_warning(&format!("Cannot read {}: {}", path.display(), e));
            return Vec::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(matches) => matches,
        Err(e) => {
            logger.log_warning(&format!("Ignoring unreadable {}: {}", path.display(), e));
            Vec::new()
        }
    }
}

/// Run the analyze stage over the configured directories.
pub async fn analyze(config: &WorkerConfig, logger: &RunLogger) -> WorkerResult<AnalysisSnapshot> {
    logger.log_start(&format!("scanning {}", config.input_dir.display()));
    let videos = discover_videos(&config.input_dir).await?;
    logger.log_progress(&format!("Found {} videos", videos.len()));

    let semaphore = Arc::new(Semaphore::new(config.max_analysis_parallel.max(1)));
    let futures: Vec<_> = videos
        .into_iter()
        .map(|video| {
            let semaphore = Arc::clone(&semaphore);
            let artifact_dir = config.artifact_dir.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.ok();
                analyze_stream(video, artifact_dir).await
            }
        })
        .collect();
    let outcomes = join_all(futures).await;

    let mut snapshot = AnalysisSnapshot::new();
    let mut eligible: HashSet<StreamId> = HashSet::new();
    for outcome in outcomes {
        snapshot.warnings.extend(outcome.warnings);
        let Some(metadata) = outcome.metadata else {
            continue;
        };
        if outcome.identity_eligible {
            eligible.insert(outcome.stream_id.clone());
        }
        if !outcome.rows.is_empty() {
            snapshot.pose_matches.insert(outcome.stream_id, outcome.rows);
        }
        snapshot.streams.push(metadata);
    }

    if snapshot.streams.is_empty() {
        logger.log_error("no stream could be analyzed");
        return Err(WorkerError::analysis_failed(format!(
            "none of the videos in {} could be analyzed",
            config.input_dir.display()
        )));
    }

    let verified = read_verified(&config.artifact_dir, logger).await;
    let known: HashSet<StreamId> = snapshot.stream_ids().into_iter().collect();
    let eligible: HashSet<StreamId> = eligible.intersection(&known).cloned().collect();
    let ineligible: BTreeSet<&StreamId> = verified
        .iter()
        .flat_map(|m| [&m.stream_a, &m.stream_b])
        .filter(|s| !eligible.contains(*s))
        .collect();
    for stream in ineligible {
        snapshot.add_warning(StreamWarning::new(
            stream.clone(),
            AnalysisStage::IdentityVerification,
            "verified matches ignored: stream is multi-person or was not analyzed",
        ));
    }
    let (verified, dropped) = gate_single_subject(verified, &eligible);
    if dropped > 0 {
        logger.log_progress(&format!(
            "Dropped {} verified matches on multi-person or unanalyzed streams",
            dropped
        ));
    }
    snapshot.verified_matches = verified;

    logger.log_completion(&format!(
        "{} streams, {} pose rows, {} verified matches, {} warnings",
        snapshot.streams.len(),
        snapshot.pose_row_count(),
        snapshot.verified_matches.len(),
        snapshot.warnings.len()
    ));
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.MP4", "a.mov", "notes.txt", "c.mkv"] {
            fs::write(dir.path().join(name), b"").await.unwrap();
        }
        fs::create_dir(dir.path().join("d.mp4")).await.unwrap();

        let videos = discover_videos(dir.path()).await.unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mov", "b.MP4", "c.mkv"]);
    }

    #[tokio::test]
    async fn test_empty_directory_is_no_streams() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_videos(dir.path()).await.unwrap_err();
        assert!(matches!(err, WorkerError::NoStreams(_)));
    }

    #[tokio::test]
    async fn test_artifact_for_other_stream_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("a.mp4");
        fs::write(&video, b"").await.unwrap();
        let artifact = StreamAnalysisArtifact {
            stream_id: StreamId::new("z"),
            metadata: None,
            max_people_per_frame: 1,
            pose_matches: vec![],
        };
        fs::write(
            dir.path().join("a.json"),
            serde_json::to_vec(&artifact).unwrap(),
        )
        .await
        .unwrap();

        let outcome = analyze_stream(video, dir.path().to_path_buf()).await;
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.stage == AnalysisStage::PoseAnalysis));
        assert!(!outcome.identity_eligible);
    }
}
