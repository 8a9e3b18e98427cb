//! Path confinement for the local backend.

use std::path::{Path, PathBuf};

use filestore_core::StorageError;

/// Reserved directory under the root that holds sidecar metadata.
pub const METADATA_DIR: &str = ".metadata";

/// A requested path after confinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized `/`-separated path relative to the root ("" for the root)
    pub relative: String,
    /// Absolute filesystem path
    pub full: PathBuf,
}

/// Confines every path to a canonical root directory.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// `root` must already be canonical.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically normalize a requested path.
    ///
    /// Leading separators, empty and `.` segments are dropped; `..` pops the
    /// previous segment and fails once it would climb above the root.
    pub fn normalize(path: &str) -> Result<String, StorageError> {
        let mut parts: Vec<&str> = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    if parts.pop().is_none() {
                        return Err(out_of_bounds(path));
                    }
                }
                s => parts.push(s),
            }
        }

        if parts.first() == Some(&METADATA_DIR) {
            return Err(out_of_bounds(path));
        }

        Ok(parts.join("/"))
    }

    /// Resolve a requested path to a location inside the root.
    ///
    /// After lexical normalization the deepest existing ancestor is
    /// canonicalized, so a symlink pointing outside the root is rejected too.
    pub async fn resolve(&self, path: &str) -> Result<ResolvedPath, StorageError> {
        let relative = Self::normalize(path)?;
        let full = relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment));

        self.ensure_contained(&full, path).await?;

        Ok(ResolvedPath { relative, full })
    }

    async fn ensure_contained(&self, full: &Path, requested: &str) -> Result<(), StorageError> {
        let mut candidate = Some(full);
        while let Some(current) = candidate.filter(|c| c.starts_with(&self.root)) {
            match tokio::fs::canonicalize(current).await {
                Ok(canonical) => {
                    return if canonical.starts_with(&self.root) {
                        Ok(())
                    } else {
                        Err(out_of_bounds(requested))
                    };
                }
                // A missing root holds nothing that could lead outside it.
                Err(_) if current == self.root.as_path() => return Ok(()),
                // Not created yet (or not a directory): check the parent instead.
                Err(_) => candidate = current.parent(),
            }
        }
        Err(out_of_bounds(requested))
    }
}

fn out_of_bounds(path: &str) -> StorageError {
    StorageError::PathOutsideBounds {
        path: path.to_string(),
    }
}

/// Join a child name onto a normalized relative path.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestore_core::ErrorCode;
    use tempfile::TempDir;

    fn sandbox(dir: &TempDir) -> Sandbox {
        Sandbox::new(dir.path().canonicalize().unwrap())
    }

    #[test]
    fn normalize_strips_and_collapses() {
        assert_eq!(Sandbox::normalize("/a//b/./c.txt").unwrap(), "a/b/c.txt");
        assert_eq!(Sandbox::normalize("a/x/../b.txt").unwrap(), "a/b.txt");
        assert_eq!(Sandbox::normalize("").unwrap(), "");
        assert_eq!(Sandbox::normalize("/").unwrap(), "");
    }

    #[test]
    fn normalize_rejects_escapes() {
        for path in ["../../etc/passwd", "..", "a/../../b", "/../x"] {
            let err = Sandbox::normalize(path).unwrap_err();
            assert_eq!(err.code(), ErrorCode::PathOutsideBounds, "{}", path);
        }
    }

    #[test]
    fn metadata_dir_is_reserved() {
        let err = Sandbox::normalize(".metadata/a.meta.json").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);
        // Only at the top level.
        assert!(Sandbox::normalize("docs/.metadata").is_ok());
    }

    #[tokio::test]
    async fn resolve_inside_root() {
        let dir = TempDir::new().unwrap();
        let sandbox = sandbox(&dir);

        let resolved = sandbox.resolve("a/b.txt").await.unwrap();
        assert_eq!(resolved.relative, "a/b.txt");
        assert_eq!(resolved.full, sandbox.root().join("a").join("b.txt"));

        let root = sandbox.resolve("").await.unwrap();
        assert_eq!(root.full, sandbox.root());
    }

    #[tokio::test]
    async fn resolve_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let sandbox = sandbox(&dir);

        let err = sandbox.resolve("../../etc/passwd").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_rejects_symlink_escape() {
        let outside = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let sandbox = sandbox(&dir);

        let err = sandbox.resolve("link/secret.txt").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);
    }

    #[tokio::test]
    async fn resolve_under_removed_root() {
        let dir = TempDir::new().unwrap();
        let sandbox = sandbox(&dir);
        std::fs::remove_dir_all(sandbox.root()).unwrap();

        let resolved = sandbox.resolve("a.txt").await.unwrap();
        assert_eq!(resolved.full, sandbox.root().join("a.txt"));
    }

    #[test]
    fn child_paths() {
        assert_eq!(child_path("", "a"), "a");
        assert_eq!(child_path("a", "b"), "a/b");
    }
}
