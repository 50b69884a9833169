//! Analyze and plan-only render over artifacts on disk.
//!
//! The artifacts carry stream metadata, so no FFmpeg binary is needed.

use std::path::Path;

use pcut_models::{
    AnalysisStage, ManualSegment, PoseMatchRow, StreamAnalysisArtifact, StreamId, StreamMetadata,
    TimelineDocument, VerifiedMatch,
};
use pcut_worker::{
    analyze, load_snapshot, run_render, save_snapshot, RenderOptions, RunLogger, RunReport,
    WorkerConfig, WorkerError, REPORT_FILE, TIMELINE_FILE,
};
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    config: WorkerConfig,
}

fn artifact(id: &str, people: u32, rows: Vec<PoseMatchRow>) -> StreamAnalysisArtifact {
    StreamAnalysisArtifact {
        stream_id: StreamId::new(id),
        metadata: Some(StreamMetadata::new(id, format!("{}.mp4", id), 30.0, 10.0)),
        max_people_per_frame: people,
        pose_matches: rows,
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    tokio::fs::write(path, serde_json::to_vec(value).unwrap())
        .await
        .unwrap();
}

/// Three cameras: a-b at frame 30, b-c at frame 90.
async fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        input_dir: root.path().join("videos"),
        artifact_dir: root.path().join("artifacts"),
        output_dir: root.path().join("output"),
        ..Default::default()
    };
    tokio::fs::create_dir_all(&config.input_dir).await.unwrap();
    tokio::fs::create_dir_all(&config.artifact_dir).await.unwrap();

    for id in ["a", "b", "c"] {
        tokio::fs::write(config.input_dir.join(format!("{}.mp4", id)), b"")
            .await
            .unwrap();
    }
    write_json(
        &config.artifact_dir.join("a.json"),
        &artifact("a", 1, vec![PoseMatchRow::new(30, "b")]),
    )
    .await;
    write_json(
        &config.artifact_dir.join("b.json"),
        &artifact("b", 1, vec![PoseMatchRow::new(90, "c")]),
    )
    .await;
    write_json(&config.artifact_dir.join("c.json"), &artifact("c", 1, vec![])).await;

    Fixture {
        _root: root,
        config,
    }
}

#[tokio::test]
async fn analyze_then_plan_writes_timeline() {
    let fx = fixture().await;
    let logger = RunLogger::new("analyze");

    let snapshot = analyze(&fx.config, &logger).await.unwrap();
    assert_eq!(snapshot.stream_ids().len(), 3);
    assert!(snapshot.warnings.is_empty());
    assert_eq!(
        snapshot.streams[0].file_path,
        fx.config.input_dir.join("a.mp4")
    );

    save_snapshot(&fx.config.snapshot_path(), &snapshot)
        .await
        .unwrap();
    let snapshot = load_snapshot(&fx.config.snapshot_path()).await.unwrap();

    let options = RenderOptions {
        plan_only: true,
        ..Default::default()
    };
    let output = run_render(&fx.config, &snapshot, options, &logger.for_stage("render"))
        .await
        .unwrap();
    assert!(output.render.is_none());

    let bytes = tokio::fs::read(fx.config.output_dir.join(TIMELINE_FILE))
        .await
        .unwrap();
    let doc: TimelineDocument = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc.cut_frames(), vec![30, 90]);
    assert_eq!(doc.active_sequence(), vec![0, 1, 2]);
    assert_eq!(doc.cross_points[0].time_stamp, 1.0);

    let bytes = tokio::fs::read(fx.config.output_dir.join(REPORT_FILE))
        .await
        .unwrap();
    let report: RunReport = serde_json::from_slice(&bytes).unwrap();
    assert!(report.stitch.viable);
    assert!(report.stitch.identity_fallback);
    assert_eq!(report.run_id, logger.run_id());
}

#[tokio::test]
async fn missing_artifact_is_isolated() {
    let fx = fixture().await;
    // No artifact, and an empty file cannot be probed either.
    tokio::fs::write(fx.config.input_dir.join("d.mp4"), b"")
        .await
        .unwrap();

    let snapshot = analyze(&fx.config, &RunLogger::new("analyze"))
        .await
        .unwrap();

    assert_eq!(snapshot.streams.len(), 3);
    let stages: Vec<_> = snapshot
        .warnings
        .iter()
        .filter(|w| w.stream.as_str() == "d")
        .map(|w| w.stage)
        .collect();
    assert!(stages.contains(&AnalysisStage::PoseAnalysis));
    assert!(stages.contains(&AnalysisStage::Metadata));
}

#[tokio::test]
async fn verified_matches_on_crowded_streams_are_dropped() {
    let fx = fixture().await;
    write_json(
        &fx.config.artifact_dir.join("c.json"),
        &artifact("c", 3, vec![]),
    )
    .await;
    let verified = vec![
        VerifiedMatch {
            frame: 30,
            stream_a: StreamId::new("a"),
            stream_b: StreamId::new("b"),
            face_iou: 0.8,
            eye_vector_a: [0.0, 0.0, 1.0, 1.0],
            eye_vector_b: [0.0, 0.0, 1.0, 1.0],
        },
        VerifiedMatch {
            frame: 90,
            stream_a: StreamId::new("b"),
            stream_b: StreamId::new("c"),
            face_iou: 0.7,
            eye_vector_a: [0.0, 0.0, 1.0, 1.0],
            eye_vector_b: [0.0, 0.0, 1.0, 1.0],
        },
    ];
    write_json(
        &fx.config.artifact_dir.join(pcut_worker::VERIFIED_MATCHES_FILE),
        &verified,
    )
    .await;

    let snapshot = analyze(&fx.config, &RunLogger::new("analyze"))
        .await
        .unwrap();
    assert_eq!(snapshot.verified_matches.len(), 1);
    assert_eq!(snapshot.verified_matches[0].frame, 30);
    assert!(snapshot
        .warnings
        .iter()
        .any(|w| w.stream.as_str() == "c" && w.stage == AnalysisStage::IdentityVerification));
}

#[tokio::test]
async fn manual_sequence_overrides_search() {
    let fx = fixture().await;
    let logger = RunLogger::new("render");
    let snapshot = analyze(&fx.config, &logger).await.unwrap();

    let options = RenderOptions {
        sequence: Some(vec![
            ManualSegment::new("c.mp4", 0.0),
            ManualSegment::new("a", 4.0),
        ]),
        plan_only: true,
        ..Default::default()
    };
    let output = run_render(&fx.config, &snapshot, options, &logger)
        .await
        .unwrap();

    assert_eq!(output.plan.timeline.cut_frames(), vec![120]);
    assert!(output.plan.report.viable);
}

#[tokio::test]
async fn empty_input_directory_fails_with_input_error() {
    let fx = fixture().await;
    let config = WorkerConfig {
        input_dir: fx.config.output_dir.clone(),
        ..fx.config.clone()
    };
    tokio::fs::create_dir_all(&config.input_dir).await.unwrap();

    let err = analyze(&config, &RunLogger::new("analyze"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::NoStreams(_)));
    assert_eq!(err.exit_code(), 2);
}
