//! GitHub repository backend.
//!
//! Files live under a base directory of one repository and are read and
//! written through the contents API; `commit_tree` writes many files in a
//! single commit through the git data API.

mod client;
mod config;
mod contents;
mod repository;
mod tree;

pub use config::{GitHubConfig, DEFAULT_API_URL, DEFAULT_BRANCH, DEFAULT_TIMEOUT};
pub use repository::GitHubRepository;
pub use tree::{FileMode, TreeFile};
