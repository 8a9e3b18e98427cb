//! Atomic multi-file commits through the git data API.
//!
//! Pipeline: read the branch head, read its tree, upload blobs, build a tree
//! on top of the head tree, create a commit with the head as parent, then
//! fast-forward the branch ref. Every stage feeds the next; the ref is only
//! touched in the last one, so a failure anywhere leaves the branch as it was.

use filestore_core::StorageError;
use futures::future::try_join_all;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::client::{check_status, read_json};
use crate::contents::encode_content;
use crate::repository::GitHubRepository;

/// Git file mode of a tree entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    #[default]
    #[serde(rename = "100644")]
    Blob,
    #[serde(rename = "100755")]
    Executable,
    #[serde(rename = "040000")]
    Tree,
    #[serde(rename = "160000")]
    Commit,
    #[serde(rename = "120000")]
    Symlink,
}

impl FileMode {
    fn object_type(self) -> &'static str {
        match self {
            FileMode::Tree => "tree",
            FileMode::Commit => "commit",
            _ => "blob",
        }
    }
}

/// One entry of a multi-file commit.
///
/// With `content`, a blob is uploaded and the entry points at it with
/// `mode`. Without, the entry is a sub-tree referencing `sha` whatever
/// `mode` says; a `None` sha removes the path from the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub mode: FileMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

impl TreeFile {
    pub fn blob(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
struct RefResponse {
    object: ObjectRef,
}

#[derive(Deserialize)]
struct ObjectRef {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: ObjectRef,
}

#[derive(Serialize)]
struct NewBlob<'a> {
    content: String,
    encoding: &'a str,
}

#[derive(Serialize)]
struct TreeEntry {
    path: String,
    mode: FileMode,
    #[serde(rename = "type")]
    kind: &'static str,
    // Serialized as null when absent: that is how the API removes a path
    sha: Option<String>,
}

#[derive(Serialize)]
struct NewTree<'a> {
    base_tree: &'a str,
    tree: Vec<TreeEntry>,
}

#[derive(Serialize)]
struct NewCommit<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
}

#[derive(Serialize)]
struct RefUpdate<'a> {
    sha: &'a str,
    force: bool,
}

impl GitHubRepository {
    /// Commit `files` to `branch` (default branch when `None`) in one commit.
    ///
    /// Returns the new commit sha. Paths are scoped under `base_dir` like
    /// every other operation. Fails with `Conflict` if the branch moved
    /// while the commit was being built.
    #[instrument(skip(self, files, message), level = "debug", fields(file_count = files.len()))]
    pub async fn commit_tree(
        &self,
        files: Vec<TreeFile>,
        message: &str,
        branch: Option<&str>,
    ) -> Result<String, StorageError> {
        let branch = branch.unwrap_or(&self.default_branch);
        let ref_name = format!("heads/{}", branch);

        let head = self.read_head(&ref_name).await?;
        let base_tree = self.read_commit_tree(&head).await?;
        let entries = self.upload_entries(files).await?;
        let tree = self.create_tree(&base_tree, entries).await?;
        let commit = self.create_commit(message, &tree, &head).await?;
        self.advance_ref(&ref_name, &head, &commit).await?;

        info!("Committed {} on {} (parent {})", commit, branch, head);
        Ok(commit)
    }

    fn git_url(&self, kind: &str, rest: &str) -> Result<reqwest::Url, StorageError> {
        self.client.repo_url(
            ["git", kind]
                .into_iter()
                .chain(rest.split('/').filter(|s| !s.is_empty())),
        )
    }

    async fn read_head(&self, ref_name: &str) -> Result<String, StorageError> {
        let url = self.git_url("ref", ref_name)?;
        let response = self.client.send(Method::GET, url, |req| req).await?;
        let response = check_status(response, ref_name, || StorageError::Api {
            status: 409,
            message: "Repository is empty".to_string(),
            body: String::new(),
        })
        .await?;
        let head: RefResponse = read_json(response).await?;
        debug!("Head of {} is {}", ref_name, head.object.sha);
        Ok(head.object.sha)
    }

    async fn read_commit_tree(&self, commit: &str) -> Result<String, StorageError> {
        let url = self.git_url("commits", commit)?;
        let response = self.client.send(Method::GET, url, |req| req).await?;
        let response = check_status(response, commit, || StorageError::Api {
            status: 409,
            message: format!("Commit {} unavailable", commit),
            body: String::new(),
        })
        .await?;
        let commit: CommitResponse = read_json(response).await?;
        Ok(commit.tree.sha)
    }

    /// Upload every blob concurrently; the first failure aborts the rest.
    async fn upload_entries(&self, files: Vec<TreeFile>) -> Result<Vec<TreeEntry>, StorageError> {
        try_join_all(files.into_iter().map(|file| self.upload_entry(file))).await
    }

    async fn upload_entry(&self, file: TreeFile) -> Result<TreeEntry, StorageError> {
        let path = self.scope(&file.path)?.full;
        let (mode, sha) = match file.content {
            Some(content) => (file.mode, Some(self.create_blob(&path, &content).await?)),
            // Content-less entries are always sub-trees
            None => (FileMode::Tree, file.sha),
        };
        Ok(TreeEntry {
            path,
            mode,
            kind: mode.object_type(),
            sha,
        })
    }

    async fn create_blob(&self, path: &str, content: &str) -> Result<String, StorageError> {
        let url = self.git_url("blobs", "")?;
        let body = NewBlob {
            content: encode_content(content),
            encoding: "base64",
        };
        let response = self
            .client
            .send(Method::POST, url, |req| req.json(&body))
            .await?;
        let response = check_status(response, path, || StorageError::Api {
            status: 422,
            message: format!("Blob for \"{}\" rejected", path),
            body: String::new(),
        })
        .await?;
        let blob: ObjectRef = read_json(response).await?;
        debug!("Uploaded blob {} for {}", blob.sha, path);
        Ok(blob.sha)
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: Vec<TreeEntry>,
    ) -> Result<String, StorageError> {
        let url = self.git_url("trees", "")?;
        let body = NewTree {
            base_tree,
            tree: entries,
        };
        let response = self
            .client
            .send(Method::POST, url, |req| req.json(&body))
            .await?;
        let response = check_status(response, base_tree, || StorageError::Api {
            status: 422,
            message: "Tree rejected".to_string(),
            body: String::new(),
        })
        .await?;
        let tree: ObjectRef = read_json(response).await?;
        Ok(tree.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> Result<String, StorageError> {
        let url = self.git_url("commits", "")?;
        let body = NewCommit {
            message,
            tree,
            parents: vec![parent],
        };
        let response = self
            .client
            .send(Method::POST, url, |req| req.json(&body))
            .await?;
        let response = check_status(response, tree, || StorageError::Api {
            status: 422,
            message: "Commit rejected".to_string(),
            body: String::new(),
        })
        .await?;
        let commit: ObjectRef = read_json(response).await?;
        Ok(commit.sha)
    }

    async fn advance_ref(&self, ref_name: &str, head: &str, commit: &str) -> Result<(), StorageError> {
        let url = self.git_url("refs", ref_name)?;
        let body = RefUpdate {
            sha: commit,
            force: false,
        };
        let response = self
            .client
            .send(Method::PATCH, url, |req| req.json(&body))
            .await?;
        check_status(response, ref_name, || StorageError::Conflict {
            path: ref_name.to_string(),
            expected: head.to_string(),
            current: None,
        })
        .await?;
        Ok(())
    }
}
