use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for [`crate::LocalRepository`].
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Directory every path is confined to
    pub root: PathBuf,
    /// Create the root (and metadata directory) when missing
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_create_if_missing() -> bool {
    true
}

impl LocalConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_if_missing: true,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::new("./data")
    }
}
