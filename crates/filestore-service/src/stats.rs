use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{Result, ServiceError, ServiceErrorCode};
use crate::service::StoreService;

const NO_EXTENSION: &str = "no-extension";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    pub total_files: u64,
    pub total_directories: u64,
    pub total_size: u64,
    /// Lowercased extension -> file count
    pub file_types: BTreeMap<String, u64>,
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| NO_EXTENSION.to_string())
}

impl StoreService {
    /// Aggregate counts over the whole tree. Directory markers are not
    /// counted as files.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_stats(&self) -> Result<RepositoryStats> {
        let entries = self.walk(usize::MAX, None).await.map_err(|e| {
            ServiceError::wrap(
                ServiceErrorCode::StatsFailed,
                "Failed to get repository statistics",
                e,
            )
        })?;

        let mut stats = RepositoryStats::default();
        for entry in entries {
            if entry.is_dir() {
                stats.total_directories += 1;
            } else if !entry.is_marker() {
                stats.total_files += 1;
                stats.total_size += entry.size_bytes;
                *stats.file_types.entry(extension_of(&entry.name)).or_insert(0) += 1;
            }
        }

        debug!(
            "Stats: {} files, {} directories, {} bytes",
            stats.total_files, stats.total_directories, stats.total_size
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!(extension_of("a.MD"), "md");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("Makefile"), "no-extension");
        assert_eq!(extension_of(".gitignore"), "no-extension");
    }
}
