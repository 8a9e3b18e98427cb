use async_trait::async_trait;

use crate::entry::{CreateDirectoryOptions, CreateFileOptions, FileEntry, UpdateFileOptions};
use crate::error::StorageError;

/// Capability contract shared by every storage backend.
///
/// Paths are `/`-separated and relative to the backend's root or scope. A
/// path that resolves outside it fails with `PathOutsideBounds`.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Short backend identifier, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Create a new file.
    ///
    /// Fails with `AlreadyExists` if the path is taken.
    async fn create_file(
        &self,
        path: &str,
        options: CreateFileOptions,
    ) -> Result<FileEntry, StorageError>;

    /// Replace the content of an existing file.
    ///
    /// `options.hash` must equal the stored hash, otherwise the call fails with
    /// `Conflict` and nothing is written. Fails with `NotFound` if the file is
    /// missing.
    async fn update_file(
        &self,
        path: &str,
        options: UpdateFileOptions,
    ) -> Result<FileEntry, StorageError>;

    /// Read a file, content included.
    async fn retrieve_file(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileEntry, StorageError>;

    /// Delete a file whose stored hash equals `hash`.
    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        hash: &str,
        branch: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Create a directory (materialized by its marker file).
    async fn create_directory(
        &self,
        path: &str,
        options: CreateDirectoryOptions,
    ) -> Result<FileEntry, StorageError>;

    /// List the immediate children of a directory, without content.
    ///
    /// An empty path lists the root.
    async fn list_directory(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<FileEntry>, StorageError>;

    /// Check whether a file or directory exists.
    async fn exists(&self, path: &str, git_ref: Option<&str>) -> Result<bool, StorageError>;

    /// Create the file, or update it against its current hash if it exists.
    async fn create_or_update_file(
        &self,
        path: &str,
        options: CreateFileOptions,
    ) -> Result<FileEntry, StorageError> {
        match self.retrieve_file(path, options.branch.as_deref()).await {
            Ok(existing) => {
                self.update_file(path, UpdateFileOptions::from_create(options, existing.hash))
                    .await
            }
            Err(e) if e.is_not_found() => self.create_file(path, options).await,
            Err(e) => Err(e),
        }
    }
}
