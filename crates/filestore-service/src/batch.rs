use filestore_core::FileEntry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{ServiceError, ServiceErrorCode};
use crate::service::{StoreService, WriteOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    /// Any kind this version does not know; fails with `VALIDATION`.
    #[serde(other)]
    Unknown,
}

/// One entry of a batch, as read from JSON: `{"type": "create", "path": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FileOperation {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Create,
            path: path.into(),
            content: Some(content.into()),
            message: None,
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Update,
            path: path.into(),
            content: Some(content.into()),
            message: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            path: path.into(),
            content: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSuccess {
    pub path: String,
    pub file: FileEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub successful: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
    pub summary: BatchSummary,
}

impl StoreService {
    /// Run `operations` in order. Each failure is recorded and the batch
    /// continues; nothing is rolled back.
    #[instrument(skip(self, operations), level = "debug", fields(count = operations.len()))]
    pub async fn batch_operations(&self, operations: Vec<FileOperation>) -> BatchResult {
        let mut result = BatchResult::default();
        let total = operations.len();

        for operation in operations {
            match self.apply(&operation).await {
                Ok(file) => {
                    debug!("Batch {:?} {} succeeded", operation.kind, operation.path);
                    result.successful.push(BatchSuccess {
                        path: operation.path,
                        file,
                    });
                }
                Err(e) => {
                    debug!("Batch {:?} {} failed: {}", operation.kind, operation.path, e);
                    result.failed.push(BatchFailure {
                        path: operation.path,
                        error: e.describe(),
                    });
                }
            }
        }

        result.summary = BatchSummary {
            total,
            successful: result.successful.len(),
            failed: result.failed.len(),
        };
        info!(
            "Batch finished: {} of {} operations succeeded",
            result.summary.successful, total
        );
        result
    }

    async fn apply(&self, operation: &FileOperation) -> Result<FileEntry, ServiceError> {
        if operation.path.trim().is_empty() {
            return Err(ServiceError::new(
                ServiceErrorCode::Validation,
                "Path is required",
            ));
        }
        let message = operation.message.as_deref();

        match operation.kind {
            OperationKind::Create => {
                let content = required_content(operation, "create")?;
                self.create_file(&operation.path, content, message, WriteOptions::default())
                    .await
            }
            OperationKind::Update => {
                let content = required_content(operation, "update")?;
                self.update_file(&operation.path, content, message, WriteOptions::default())
                    .await
            }
            OperationKind::Delete => {
                self.delete_file(&operation.path, message, WriteOptions::default())
                    .await
            }
            OperationKind::Unknown => Err(ServiceError::new(
                ServiceErrorCode::Validation,
                "Unknown operation type",
            )),
        }
    }
}

// Empty content is valid (directory markers are empty files).
fn required_content<'a>(operation: &'a FileOperation, kind: &str) -> Result<&'a str, ServiceError> {
    operation.content.as_deref().ok_or_else(|| {
        ServiceError::new(
            ServiceErrorCode::Validation,
            format!("Content is required for {} operations", kind),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_from_json() {
        let ops: Vec<FileOperation> = serde_json::from_str(
            r##"[
                {"type": "create", "path": "a.md", "content": "# A"},
                {"type": "delete", "path": "b.md", "message": "Remove b"},
                {"type": "rename", "path": "c.md"}
            ]"##,
        )
        .unwrap();

        assert_eq!(ops[0], FileOperation::create("a.md", "# A"));
        assert_eq!(ops[1], FileOperation::delete("b.md").with_message("Remove b"));
        assert_eq!(ops[2].kind, OperationKind::Unknown);
    }

    #[test]
    fn missing_content_is_a_validation_error() {
        let op = FileOperation {
            content: None,
            ..FileOperation::create("a.md", "")
        };
        let err = required_content(&op, "create").unwrap_err();
        assert_eq!(err.code, ServiceErrorCode::Validation);

        let empty = FileOperation::create("a/.gitkeep", "");
        assert_eq!(required_content(&empty, "create").unwrap(), "");
    }
}
