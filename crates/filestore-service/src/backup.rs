use chrono::{SecondsFormat, Utc};
use regex::Regex;
use tracing::{info, instrument};

use crate::batch::{BatchResult, FileOperation};
use crate::error::{Result, ServiceError, ServiceErrorCode};
use crate::search::SearchOptions;
use crate::service::StoreService;

pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Folder name for a backup taken now: ISO-8601 UTC with `:` and `.`
/// replaced so it is a valid path segment everywhere.
pub fn backup_timestamp() -> String {
    Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

impl StoreService {
    /// Copy every non-empty file whose name matches `pattern` to
    /// `dest/<timestamp>/<path>`.
    #[instrument(skip(self), level = "debug")]
    pub async fn backup(&self, pattern: &Regex, dest: Option<&str>) -> Result<BatchResult> {
        let dest = dest.unwrap_or(DEFAULT_BACKUP_DIR).trim_end_matches('/');
        let options = SearchOptions {
            pattern: Some(pattern.clone()),
            include_content: true,
            ..Default::default()
        };

        let found = self.search_files("", options).await.map_err(|e| {
            ServiceError::wrap(
                ServiceErrorCode::BackupFailed,
                format!("Failed to backup files with pattern \"{}\"", pattern),
                e,
            )
        })?;

        let timestamp = backup_timestamp();
        let operations: Vec<FileOperation> = found
            .files
            .into_iter()
            .filter_map(|file| {
                let content = file.content.filter(|c| !c.is_empty())?;
                Some(
                    FileOperation::create(format!("{}/{}/{}", dest, timestamp, file.path), content)
                        .with_message(format!("Backup {}", file.path)),
                )
            })
            .collect();

        info!(
            "Backing up {} files to {}/{}",
            operations.len(),
            dest,
            timestamp
        );
        Ok(self.batch_operations(operations).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_path_safe() {
        let ts = backup_timestamp();
        assert!(!ts.contains(':'));
        assert!(!ts.contains('.'));
        assert!(ts.ends_with('Z'));
        // 2024-01-02T03-04-05-678Z
        assert_eq!(ts.len(), 24);
    }
}
