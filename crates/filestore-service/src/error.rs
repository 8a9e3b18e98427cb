use std::error::Error as StdError;
use std::fmt;

use filestore_core::{ErrorCode, FileEntry, StorageError};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Stable codes for service-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorCode {
    CreateFileFailed,
    UpdateFileFailed,
    SaveFileFailed,
    DeleteFileFailed,
    CreateDirectoryFailed,
    RetrieveFileFailed,
    ListDirectoryFailed,
    CopyFileFailed,
    NoContent,
    MoveFileFailed,
    MovePartiallyApplied,
    SearchFailed,
    StatsFailed,
    BackupFailed,
    Validation,
}

impl ServiceErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceErrorCode::CreateFileFailed => "CREATE_FILE_FAILED",
            ServiceErrorCode::UpdateFileFailed => "UPDATE_FILE_FAILED",
            ServiceErrorCode::SaveFileFailed => "SAVE_FILE_FAILED",
            ServiceErrorCode::DeleteFileFailed => "DELETE_FILE_FAILED",
            ServiceErrorCode::CreateDirectoryFailed => "CREATE_DIRECTORY_FAILED",
            ServiceErrorCode::RetrieveFileFailed => "RETRIEVE_FILE_FAILED",
            ServiceErrorCode::ListDirectoryFailed => "LIST_DIRECTORY_FAILED",
            ServiceErrorCode::CopyFileFailed => "COPY_FILE_FAILED",
            ServiceErrorCode::NoContent => "NO_CONTENT",
            ServiceErrorCode::MoveFileFailed => "MOVE_FILE_FAILED",
            ServiceErrorCode::MovePartiallyApplied => "MOVE_PARTIALLY_APPLIED",
            ServiceErrorCode::SearchFailed => "SEARCH_FAILED",
            ServiceErrorCode::StatsFailed => "STATS_FAILED",
            ServiceErrorCode::BackupFailed => "BACKUP_FAILED",
            ServiceErrorCode::Validation => "VALIDATION",
        }
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation-scoped failure. The underlying cause is always preserved.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub code: ServiceErrorCode,
    pub message: String,
    #[source]
    pub cause: Option<BoxError>,
    /// Side effect that was applied before the failure (partial moves)
    pub applied: Option<Box<FileEntry>>,
}

impl ServiceError {
    pub fn new(code: ServiceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            applied: None,
        }
    }

    pub fn wrap(
        code: ServiceErrorCode,
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            cause: Some(cause.into()),
            applied: None,
        }
    }

    pub fn with_applied(mut self, entry: FileEntry) -> Self {
        self.applied = Some(Box::new(entry));
        self
    }

    /// Backend code of the first `StorageError` in the cause chain.
    pub fn storage_code(&self) -> Option<ErrorCode> {
        let mut current = self.source();
        while let Some(err) = current {
            if let Some(storage) = err.downcast_ref::<StorageError>() {
                return Some(storage.code());
            }
            current = err.source();
        }
        None
    }

    /// Message followed by every cause, `: `-separated.
    pub fn describe(&self) -> String {
        let mut text = self.message.clone();
        let mut current = self.source();
        while let Some(err) = current {
            text.push_str(": ");
            text.push_str(&err.to_string());
            current = err.source();
        }
        text
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_code_walks_nested_causes() {
        let inner = ServiceError::wrap(
            ServiceErrorCode::CopyFileFailed,
            "Failed to copy",
            StorageError::AlreadyExists {
                path: "b.txt".into(),
            },
        );
        let outer = ServiceError::wrap(ServiceErrorCode::MoveFileFailed, "Failed to move", inner);

        assert_eq!(outer.code.as_str(), "MOVE_FILE_FAILED");
        assert_eq!(outer.storage_code(), Some(ErrorCode::AlreadyExists));
        assert_eq!(
            outer.describe(),
            "Failed to move: Failed to copy: File \"b.txt\" already exists"
        );
    }

    #[test]
    fn no_cause() {
        let err = ServiceError::new(ServiceErrorCode::Validation, "path is required");
        assert_eq!(err.storage_code(), None);
        assert_eq!(err.describe(), "path is required");
        assert_eq!(err.to_string(), "path is required");
    }
}
