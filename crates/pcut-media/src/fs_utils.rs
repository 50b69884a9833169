//! Filesystem helpers for placing rendered files.
//!
//! Renders happen in a scratch directory that may live on a different
//! filesystem than the output directory, so a plain rename can fail with EXDEV.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Move a file from `src` to `dst`, falling back to copy-and-delete across devices.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy `src` to `dst` through a temp file next to `dst`.
pub async fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    let tmp_dst = dst.with_extension("partial");
    if let Err(e) = fs::copy(src, &tmp_dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }
    Ok(())
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// EXDEV is error code 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    copy_file(src, dst).await?;

    if let Err(e) = fs::remove_file(src).await {
        warn!(
            "Failed to remove source after cross-device move: {}: {}",
            src.display(),
            e
        );
    }
    Ok(())
}
