//! Core contract and types for filestore backends.
//!
//! This crate defines the abstractions shared between the local and remote
//! storage implementations:
//! - `StoreRepository`: the operation set every backend implements
//! - `FileEntry`: the file/directory record returned by every operation
//! - `StorageError` / `ErrorCode`: the backend-independent error taxonomy
//! - `blob_hash`: the git-blob content hash used for optimistic concurrency

mod entry;
mod error;
mod hash;
mod repository;

pub use entry::{
    entry_name, ContentEncoding, CreateDirectoryOptions, CreateFileOptions, EntryKind, FileEntry,
    Identity, UpdateFileOptions, MARKER_FILE_NAME,
};
pub use error::{ErrorCode, StorageError};
pub use hash::blob_hash;
pub use repository::StoreRepository;
