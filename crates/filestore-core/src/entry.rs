use serde::{Deserialize, Serialize};

use crate::hash::blob_hash;

/// Name of the placeholder file that materializes a directory.
///
/// Git has no empty directories, so both backends mark a directory with this
/// (empty) file.
pub const MARKER_FILE_NAME: &str = ".gitkeep";

/// Kind of a stored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Encoding of `FileEntry::content` as handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Utf8,
}

/// A file or directory record.
///
/// Records are built fresh per call and never cached. `hash` and
/// `size_bytes` always describe the same observed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Last path segment
    pub name: String,
    /// Caller-relative path
    pub path: String,
    /// Git blob hash of the content (empty-blob hash for directories)
    pub hash: String,
    /// Size in bytes (0 for directories)
    pub size_bytes: u64,
    pub kind: EntryKind,
    /// Present only when the operation read or wrote the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<ContentEncoding>,
}

impl FileEntry {
    /// Build a file record from its full content.
    ///
    /// Hash and size are derived from the same bytes.
    pub fn with_content(path: &str, content: String) -> Self {
        Self {
            name: entry_name(path),
            path: path.to_string(),
            hash: blob_hash(content.as_bytes()),
            size_bytes: content.len() as u64,
            kind: EntryKind::File,
            content: Some(content),
            encoding: Some(ContentEncoding::Utf8),
        }
    }

    /// Build a file record without content.
    pub fn file(path: &str, hash: String, size_bytes: u64) -> Self {
        Self {
            name: entry_name(path),
            path: path.to_string(),
            hash,
            size_bytes,
            kind: EntryKind::File,
            content: None,
            encoding: None,
        }
    }

    /// Build a directory record.
    pub fn directory(path: &str, hash: String) -> Self {
        Self {
            name: entry_name(path),
            path: path.to_string(),
            hash,
            size_bytes: 0,
            kind: EntryKind::Dir,
            content: None,
            encoding: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Whether this record is a directory marker file.
    pub fn is_marker(&self) -> bool {
        self.is_file() && self.name == MARKER_FILE_NAME
    }

    /// Drop the content, keeping hash and size.
    pub fn without_content(mut self) -> Self {
        self.content = None;
        self.encoding = None;
        self
    }
}

/// Last segment of a `/`-separated path.
pub fn entry_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Author or committer identity attached to a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateFileOptions {
    pub message: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Identity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFileOptions {
    pub message: String,
    pub content: String,
    /// Hash last observed by the caller
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Identity>,
}

impl UpdateFileOptions {
    /// Turn create options into update options against `hash`.
    pub fn from_create(options: CreateFileOptions, hash: String) -> Self {
        Self {
            message: options.message,
            content: options.content,
            hash,
            branch: options.branch,
            author: options.author,
            committer: options.committer,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDirectoryOptions {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Identity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_from_content_is_coherent() {
        let entry = FileEntry::with_content("a/b.txt", "hello".to_string());
        assert_eq!(entry.name, "b.txt");
        assert_eq!(entry.size_bytes, 5);
        assert_eq!(entry.hash, blob_hash(b"hello"));
        assert!(entry.is_file());
        assert!(!entry.is_marker());
    }

    #[test]
    fn entry_names() {
        assert_eq!(entry_name("a/b/c.md"), "c.md");
        assert_eq!(entry_name("top"), "top");
        assert_eq!(entry_name("dir/"), "dir");
        assert_eq!(entry_name(""), "");
    }

    #[test]
    fn kind_serializes_lowercase() {
        let entry = FileEntry::directory("proj/src", blob_hash(b""));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "dir");
        assert!(json.get("content").is_none());
    }
}
