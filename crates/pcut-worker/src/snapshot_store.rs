//! Analysis snapshot persistence.
//!
//! The snapshot is the explicit hand-off between the analyze and render
//! stages. It is written once and read back as an immutable value.

use std::path::Path;

use pcut_models::{AnalysisSnapshot, SNAPSHOT_VERSION};
use tokio::fs;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// File name of the snapshot inside the output directory.
pub const SNAPSHOT_FILE: &str = "analysis_snapshot.json";

/// Write `snapshot` as pretty JSON, replacing any previous file atomically.
pub async fn save_snapshot(path: &Path, snapshot: &AnalysisSnapshot) -> WorkerResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    debug!(
        path = %path.display(),
        snapshot_id = %snapshot.snapshot_id,
        streams = snapshot.streams.len(),
        "Saved analysis snapshot"
    );
    Ok(())
}

/// Read a snapshot, rejecting other format versions.
pub async fn load_snapshot(path: &Path) -> WorkerResult<AnalysisSnapshot> {
    let bytes = fs::read(path).await?;

    // Check the version before the full parse so old layouts report clearly.
    let version = serde_json::from_slice::<serde_json::Value>(&bytes)?
        .get("analysis_version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0) as u32;
    if version != SNAPSHOT_VERSION {
        return Err(WorkerError::SnapshotVersion {
            found: version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let snapshot: AnalysisSnapshot = serde_json::from_slice(&bytes)?;
    debug!(
        path = %path.display(),
        snapshot_id = %snapshot.snapshot_id,
        "Loaded analysis snapshot"
    );
    Ok(snapshot)
}
