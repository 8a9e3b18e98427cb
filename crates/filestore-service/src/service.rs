use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use filestore_core::{
    CreateDirectoryOptions, CreateFileOptions, FileEntry, Identity, StorageError,
    StoreRepository, UpdateFileOptions,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError, ServiceErrorCode};

/// Optional attributes of a write.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub branch: Option<String>,
    pub author: Option<Identity>,
    pub committer: Option<Identity>,
    /// Hash to compare against instead of resolving the current one.
    /// Only used by updates and deletes.
    pub expected_hash: Option<String>,
}

/// Result of [`StoreService::create_directory`].
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryCreation {
    pub directory: FileEntry,
    pub files: Vec<FileEntry>,
}

/// Higher-level file operations over any [`StoreRepository`].
///
/// The backend is injected at construction; the service never knows which
/// one it talks to.
#[derive(Clone)]
pub struct StoreService {
    repo: Arc<dyn StoreRepository>,
    call_timeout: Option<Duration>,
}

impl StoreService {
    pub fn new(repo: Arc<dyn StoreRepository>) -> Self {
        Self {
            repo,
            call_timeout: None,
        }
    }

    /// Bound every backend call; an expired call fails with `TIMEOUT`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn repository(&self) -> &Arc<dyn StoreRepository> {
        &self.repo
    }

    pub(crate) async fn call<T>(
        &self,
        fut: impl Future<Output = std::result::Result<T, StorageError>>,
    ) -> std::result::Result<T, StorageError> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| StorageError::Timeout(limit.as_millis() as u64))?,
            None => fut.await,
        }
    }

    /// Current hash of `path`, unless the caller pinned one.
    async fn resolve_hash(
        &self,
        path: &str,
        options: &WriteOptions,
    ) -> std::result::Result<String, StorageError> {
        match &options.expected_hash {
            Some(hash) => Ok(hash.clone()),
            None => Ok(self.call(self.repo.retrieve_file(path, None)).await?.hash),
        }
    }

    #[instrument(skip(self, content, options), level = "debug")]
    pub async fn create_file(
        &self,
        path: &str,
        content: impl Into<String>,
        message: Option<&str>,
        options: WriteOptions,
    ) -> Result<FileEntry> {
        let create = CreateFileOptions {
            message: message
                .map(str::to_string)
                .unwrap_or_else(|| format!("Create {}", path)),
            content: content.into(),
            branch: options.branch,
            author: options.author,
            committer: options.committer,
        };

        self.call(self.repo.create_file(path, create))
            .await
            .map_err(|e| {
                ServiceError::wrap(
                    ServiceErrorCode::CreateFileFailed,
                    format!("Failed to create file \"{}\"", path),
                    e,
                )
            })
    }

    #[instrument(skip(self, content, options), level = "debug")]
    pub async fn update_file(
        &self,
        path: &str,
        content: impl Into<String>,
        message: Option<&str>,
        options: WriteOptions,
    ) -> Result<FileEntry> {
        let content = content.into();
        let result = async {
            let hash = self.resolve_hash(path, &options).await?;
            let update = UpdateFileOptions {
                message: message
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Update {}", path)),
                content,
                hash,
                branch: options.branch.clone(),
                author: options.author.clone(),
                committer: options.committer.clone(),
            };
            self.call(self.repo.update_file(path, update)).await
        }
        .await;

        result.map_err(|e| {
            ServiceError::wrap(
                ServiceErrorCode::UpdateFileFailed,
                format!("Failed to update file \"{}\"", path),
                e,
            )
        })
    }

    /// Create the file, or update it if it exists.
    #[instrument(skip(self, content, options), level = "debug")]
    pub async fn save_file(
        &self,
        path: &str,
        content: impl Into<String>,
        message: Option<&str>,
        options: WriteOptions,
    ) -> Result<FileEntry> {
        let save = CreateFileOptions {
            message: message
                .map(str::to_string)
                .unwrap_or_else(|| format!("Save {}", path)),
            content: content.into(),
            branch: options.branch,
            author: options.author,
            committer: options.committer,
        };

        self.call(self.repo.create_or_update_file(path, save))
            .await
            .map_err(|e| {
                ServiceError::wrap(
                    ServiceErrorCode::SaveFileFailed,
                    format!("Failed to save file \"{}\"", path),
                    e,
                )
            })
    }

    /// Delete a file and return the record it had, without content.
    #[instrument(skip(self, options), level = "debug")]
    pub async fn delete_file(
        &self,
        path: &str,
        message: Option<&str>,
        options: WriteOptions,
    ) -> Result<FileEntry> {
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Delete {}", path));

        let result = async {
            let current = self.call(self.repo.retrieve_file(path, None)).await?;
            let hash = options
                .expected_hash
                .clone()
                .unwrap_or_else(|| current.hash.clone());
            self.call(self.repo.delete_file(
                path,
                &message,
                &hash,
                options.branch.as_deref(),
            ))
            .await?;
            Ok::<_, StorageError>(current.without_content())
        }
        .await;

        result.map_err(|e| {
            ServiceError::wrap(
                ServiceErrorCode::DeleteFileFailed,
                format!("Failed to delete file \"{}\"", path),
                e,
            )
        })
    }

    /// Create a directory, then each `(name, content)` init file inside it.
    #[instrument(skip(self, init_files), level = "debug", fields(init_count = init_files.len()))]
    pub async fn create_directory(
        &self,
        path: &str,
        message: Option<&str>,
        init_files: &[(String, String)],
    ) -> Result<DirectoryCreation> {
        let wrap = |e: ServiceError| {
            ServiceError::wrap(
                ServiceErrorCode::CreateDirectoryFailed,
                format!("Failed to create directory \"{}\"", path),
                e,
            )
        };

        let options = CreateDirectoryOptions {
            message: message
                .map(str::to_string)
                .unwrap_or_else(|| format!("Create directory {}", path)),
            ..Default::default()
        };
        let directory = self
            .call(self.repo.create_directory(path, options))
            .await
            .map_err(|e| {
                ServiceError::wrap(
                    ServiceErrorCode::CreateDirectoryFailed,
                    format!("Failed to create directory \"{}\"", path),
                    e,
                )
            })?;

        let mut files = Vec::with_capacity(init_files.len());
        for (name, content) in init_files {
            let file = self
                .create_file(
                    &format!("{}/{}", path, name),
                    content.as_str(),
                    Some(&format!("Initialize {} in {}", name, path)),
                    WriteOptions::default(),
                )
                .await
                .map_err(wrap)?;
            files.push(file);
        }

        debug!("Created directory {} with {} files", path, files.len());
        Ok(DirectoryCreation { directory, files })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn retrieve_file(&self, path: &str, git_ref: Option<&str>) -> Result<FileEntry> {
        self.call(self.repo.retrieve_file(path, git_ref))
            .await
            .map_err(|e| {
                ServiceError::wrap(
                    ServiceErrorCode::RetrieveFileFailed,
                    format!("Failed to retrieve file \"{}\"", path),
                    e,
                )
            })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list_directory(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<FileEntry>> {
        self.call(self.repo.list_directory(path, git_ref))
            .await
            .map_err(|e| {
                ServiceError::wrap(
                    ServiceErrorCode::ListDirectoryFailed,
                    format!("Failed to list directory \"{}\"", path),
                    e,
                )
            })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn exists(&self, path: &str, git_ref: Option<&str>) -> Result<bool> {
        self.call(self.repo.exists(path, git_ref))
            .await
            .map_err(|e| {
                ServiceError::wrap(
                    ServiceErrorCode::RetrieveFileFailed,
                    format!("Failed to check \"{}\"", path),
                    e,
                )
            })
    }

    /// Copy a file's content to a new path. The destination must not exist.
    ///
    /// An empty source fails with `NO_CONTENT`; anything else with
    /// `COPY_FILE_FAILED`.
    #[instrument(skip(self), level = "debug")]
    pub async fn copy_file(
        &self,
        source: &str,
        destination: &str,
        message: Option<&str>,
    ) -> Result<FileEntry> {
        let wrap = |e: ServiceError| {
            ServiceError::wrap(
                ServiceErrorCode::CopyFileFailed,
                format!("Failed to copy file from \"{}\" to \"{}\"", source, destination),
                e,
            )
        };

        let original = self
            .call(self.repo.retrieve_file(source, None))
            .await
            .map_err(|e| {
                wrap(ServiceError::wrap(
                    ServiceErrorCode::RetrieveFileFailed,
                    format!("Failed to retrieve file \"{}\"", source),
                    e,
                ))
            })?;

        let content = match original.content {
            Some(content) if !content.is_empty() => content,
            _ => {
                return Err(ServiceError::new(
                    ServiceErrorCode::NoContent,
                    format!("Source file \"{}\" has no content", source),
                ))
            }
        };

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Copy {} to {}", source, destination));
        self.create_file(destination, content, Some(&message), WriteOptions::default())
            .await
            .map_err(wrap)
    }

    /// Copy then delete the source.
    ///
    /// A failed delete after a successful copy is reported as
    /// `MOVE_PARTIALLY_APPLIED`, carrying the destination record.
    #[instrument(skip(self), level = "debug")]
    pub async fn move_file(
        &self,
        source: &str,
        destination: &str,
        message: Option<&str>,
    ) -> Result<FileEntry> {
        let copy_message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Move {} to {}", source, destination));
        let moved = self
            .copy_file(source, destination, Some(&copy_message))
            .await
            .map_err(|e| {
                ServiceError::wrap(
                    ServiceErrorCode::MoveFileFailed,
                    format!("Failed to move file from \"{}\" to \"{}\"", source, destination),
                    e,
                )
            })?;

        let delete_message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Remove {} after move", source));
        if let Err(e) = self
            .delete_file(source, Some(&delete_message), WriteOptions::default())
            .await
        {
            warn!(
                "Move of {} to {} left both copies: {}",
                source,
                destination,
                e.describe()
            );
            return Err(ServiceError::wrap(
                ServiceErrorCode::MovePartiallyApplied,
                format!(
                    "Copied \"{}\" to \"{}\" but could not remove the source",
                    source, destination
                ),
                e,
            )
            .with_applied(moved));
        }

        info!("Moved {} to {}", source, destination);
        Ok(moved)
    }
}
