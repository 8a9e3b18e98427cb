//! Sidecar metadata records.
//!
//! Layout: `root/.metadata/<escaped-path>.meta.json`. Sidecars are advisory:
//! the content hash can always be recomputed from the stored content.

use std::io;
use std::path::{Path, PathBuf};

use filestore_core::{Identity, StorageError};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::atomic::write_atomic;
use crate::sandbox::METADATA_DIR;

/// Version record persisted alongside a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub hash: String,
    pub message: String,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Identity>,
}

impl FileMetadata {
    pub fn new(
        hash: String,
        message: &str,
        author: Option<Identity>,
        committer: Option<Identity>,
    ) -> Self {
        Self {
            hash,
            message: message.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            author,
            committer,
        }
    }
}

/// Escape a relative path into a single, collision-free file name.
///
/// `%` is escaped first so `a%2Fb` and `a/b` never map to the same name.
pub fn escape_path(relative: &str) -> String {
    let mut escaped = String::with_capacity(relative.len());
    for c in relative.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Reads and writes sidecar records under the metadata directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(METADATA_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sidecar_path(&self, relative: &str) -> PathBuf {
        self.dir.join(format!("{}.meta.json", escape_path(relative)))
    }

    /// Load the sidecar for `relative`, if any.
    ///
    /// A missing or unreadable sidecar yields `None`.
    pub async fn load(&self, relative: &str) -> Option<FileMetadata> {
        let path = self.sidecar_path(relative);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read metadata for \"{}\": {}", relative, e);
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Ignoring corrupt metadata for \"{}\": {}", relative, e);
                None
            }
        }
    }

    /// Persist the sidecar for `relative` (atomic replace).
    pub async fn save(&self, relative: &str, metadata: &FileMetadata) -> Result<(), StorageError> {
        let path = self.sidecar_path(relative);
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(self.dir.display().to_string(), e))?;
        let json = serde_json::to_vec_pretty(metadata)?;
        write_atomic(&path, &json)
            .await
            .map_err(|e| StorageError::io(path.display().to_string(), e))?;
        debug!("Saved metadata for \"{}\" (hash {})", relative, metadata.hash);
        Ok(())
    }

    /// Remove the sidecar for `relative`. Failures are logged, not returned.
    pub async fn remove(&self, relative: &str) {
        let path = self.sidecar_path(relative);
        match fs::remove_file(&path).await {
            Ok(()) => debug!("Removed metadata for \"{}\"", relative),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete metadata for \"{}\": {}", relative, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn escaping_is_collision_free() {
        assert_eq!(escape_path("a/b.txt"), "a%2Fb.txt");
        assert_eq!(escape_path("a_b.txt"), "a_b.txt");
        assert_ne!(escape_path("a/b"), escape_path("a_b"));
        assert_ne!(escape_path("a/b"), escape_path("a%2Fb"));
        assert_eq!(escape_path("a%2Fb"), "a%252Fb");
    }

    #[tokio::test]
    async fn save_load_remove() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());

        assert!(store.load("a/b.txt").await.is_none());

        let meta = FileMetadata::new("abc".into(), "Create a/b.txt", None, None);
        store.save("a/b.txt", &meta).await.unwrap();
        assert!(dir.path().join(".metadata/a%2Fb.txt.meta.json").exists());
        assert_eq!(store.load("a/b.txt").await, Some(meta));

        store.remove("a/b.txt").await;
        assert!(store.load("a/b.txt").await.is_none());
        // Removing again is a no-op
        store.remove("a/b.txt").await;
    }

    #[tokio::test]
    async fn corrupt_sidecar_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());
        fs::create_dir_all(store.dir()).await.unwrap();
        fs::write(store.dir().join("x.meta.json"), b"{not json")
            .await
            .unwrap();

        assert!(store.load("x").await.is_none());
    }
}
