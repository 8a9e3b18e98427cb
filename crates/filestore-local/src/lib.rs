//! Sandboxed local filesystem backend.
//!
//! Every path is confined to a root directory; version tracking is emulated
//! with sidecar metadata records under `root/.metadata`.

mod atomic;
mod config;
mod lock;
mod metadata;
mod sandbox;
mod storage;

pub use config::LocalConfig;
pub use metadata::{escape_path, FileMetadata};
pub use sandbox::METADATA_DIR;
pub use storage::{LocalRepository, LocalStats};
