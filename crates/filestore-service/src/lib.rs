//! Backend-agnostic file operations on top of [`filestore_core::StoreRepository`].
//!
//! `StoreService` adds hash resolution, copy and move, ordered batches,
//! recursive search, project scaffolding, statistics and backups to whatever
//! backend it is given. Every failure is a [`ServiceError`] with a stable code
//! and the backend cause preserved.

mod backup;
mod batch;
mod error;
mod search;
mod service;
mod stats;
mod template;

pub use backup::{backup_timestamp, DEFAULT_BACKUP_DIR};
pub use batch::{BatchFailure, BatchResult, BatchSuccess, BatchSummary, FileOperation, OperationKind};
pub use error::{Result, ServiceError, ServiceErrorCode};
pub use search::{matching_lines, FileMatch, LineMatch, SearchOptions, SearchResult, DEFAULT_MAX_DEPTH};
pub use service::{DirectoryCreation, StoreService, WriteOptions};
pub use stats::RepositoryStats;
pub use template::{template_content, ProjectStructure};
