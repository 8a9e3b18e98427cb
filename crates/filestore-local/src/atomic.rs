//! Temp-file based writes.
//!
//! Temp files live next to their target and are dot-prefixed, so directory
//! listings never surface them.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
}

async fn remove_temp(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove temp file {}: {}", temp.display(), e);
        }
    }
}

/// Replace `target` with `data` atomically (temp file + rename).
pub async fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    let temp = temp_path_for(target);
    if let Err(e) = fs::write(&temp, data).await {
        remove_temp(&temp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp, target).await {
        remove_temp(&temp).await;
        return Err(e);
    }
    Ok(())
}

/// Publish `data` at `target` only if nothing exists there yet.
///
/// The content is fully written to a temp file first and then hard-linked
/// into place; the link fails with `AlreadyExists` when the target is taken,
/// which makes the create exclusive even across processes.
pub async fn publish_exclusive(target: &Path, data: &[u8]) -> io::Result<()> {
    let temp = temp_path_for(target);
    if let Err(e) = fs::write(&temp, data).await {
        remove_temp(&temp).await;
        return Err(e);
    }
    let linked = fs::hard_link(&temp, target).await;
    remove_temp(&temp).await;
    linked
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("file.txt");

        write_atomic(&target, b"one").await.unwrap();
        write_atomic(&target, b"two").await.unwrap();

        assert_eq!(fs::read(&target).await.unwrap(), b"two");
        // No temp files left behind
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn publish_exclusive_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("file.txt");

        publish_exclusive(&target, b"first").await.unwrap();
        let err = publish_exclusive(&target, b"second").await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&target).await.unwrap(), b"first");
    }
}
