use async_trait::async_trait;
use filestore_core::{
    ContentEncoding, CreateDirectoryOptions, CreateFileOptions, FileEntry, StorageError,
    StoreRepository, UpdateFileOptions, MARKER_FILE_NAME,
};
use reqwest::Method;
use tracing::{debug, info, instrument};

use crate::client::{check_status, read_json, GitHubClient};
use crate::config::GitHubConfig;
use crate::contents::{
    decode_content, encode_content, BlobResponse, ContentItem, ContentsResponse, DeleteRequest,
    WriteRequest, WriteResponse,
};

/// Split a path into its meaningful segments.
///
/// Leading separators, empty and `.` segments are dropped; `..` is refused
/// outright since the remote has no notion of a parent of `base_dir`.
pub(crate) fn segments(path: &str) -> Result<Vec<&str>, StorageError> {
    let mut parts = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(StorageError::PathOutsideBounds {
                    path: path.to_string(),
                })
            }
            s => parts.push(s),
        }
    }
    Ok(parts)
}

/// A requested path scoped under `base_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScopedPath {
    /// Normalized caller-relative path
    pub relative: String,
    /// Path inside the repository (`base_dir/relative`)
    pub full: String,
}

/// Backend storing files in a GitHub repository through the REST API.
///
/// Every path is scoped under `base_dir`; records returned to callers carry
/// paths relative to it. Optimistic concurrency is enforced by GitHub itself:
/// writes carry the blob sha last seen by the caller.
#[derive(Debug, Clone)]
pub struct GitHubRepository {
    pub(crate) client: GitHubClient,
    base_dir: String,
    pub(crate) default_branch: String,
}

impl GitHubRepository {
    pub fn new(config: GitHubConfig) -> Result<Self, StorageError> {
        let client = GitHubClient::new(&config)?;
        let base_dir = segments(&config.base_dir)?.join("/");

        info!(
            "GitHub repository {}/{} (base dir \"{}\", default branch {})",
            config.owner, config.repo, base_dir, config.default_branch
        );
        Ok(Self {
            client,
            base_dir,
            default_branch: config.default_branch,
        })
    }

    /// Raw repository description (`GET /repos/{owner}/{repo}`): visibility,
    /// default branch, size, permissions of the token and so on.
    #[instrument(skip(self), level = "debug")]
    pub async fn repository_info(&self) -> Result<serde_json::Value, StorageError> {
        let name = self.client.full_name();
        let url = self.client.repo_url(std::iter::empty::<&str>())?;
        let response = self.client.send(Method::GET, url, |req| req).await?;
        let response = check_status(response, &name, || StorageError::Api {
            status: 409,
            message: format!("Repository {} unavailable", name),
            body: String::new(),
        })
        .await?;
        read_json(response).await
    }

    pub(crate) fn scope(&self, path: &str) -> Result<ScopedPath, StorageError> {
        let relative = segments(path)?.join("/");
        let full = match (self.base_dir.is_empty(), relative.is_empty()) {
            (true, _) => relative.clone(),
            (false, true) => self.base_dir.clone(),
            (false, false) => format!("{}/{}", self.base_dir, relative),
        };
        Ok(ScopedPath { relative, full })
    }

    /// Inverse of [`Self::scope`] for paths returned by the API.
    fn unscope(&self, full: &str) -> String {
        if self.base_dir.is_empty() {
            return full.to_string();
        }
        match full.strip_prefix(&self.base_dir) {
            Some("") => String::new(),
            Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
            _ => full.to_string(),
        }
    }

    fn contents_url(&self, scoped: &ScopedPath) -> Result<reqwest::Url, StorageError> {
        self.client.repo_url(
            std::iter::once("contents").chain(scoped.full.split('/').filter(|s| !s.is_empty())),
        )
    }

    fn entry_from_item(&self, item: &ContentItem) -> FileEntry {
        let path = self.unscope(&item.path);
        if item.is_dir() {
            FileEntry::directory(&path, item.sha.clone())
        } else {
            FileEntry::file(&path, item.sha.clone(), item.size)
        }
    }

    async fn get_contents(
        &self,
        scoped: &ScopedPath,
        git_ref: Option<&str>,
    ) -> Result<ContentsResponse, StorageError> {
        let url = self.contents_url(scoped)?;
        let response = self
            .client
            .send(Method::GET, url, |req| match git_ref {
                Some(r) => req.query(&[("ref", r)]),
                None => req,
            })
            .await?;
        let response = check_status(response, &scoped.relative, || StorageError::Api {
            status: 409,
            message: "Repository is empty or unavailable".to_string(),
            body: String::new(),
        })
        .await?;
        read_json(response).await
    }

    async fn fetch_blob(&self, scoped: &ScopedPath, sha: &str) -> Result<String, StorageError> {
        let url = self.client.repo_url(["git", "blobs", sha])?;
        let response = self.client.send(Method::GET, url, |req| req).await?;
        let response = check_status(response, &scoped.relative, || StorageError::Api {
            status: 409,
            message: format!("Blob {} unavailable", sha),
            body: String::new(),
        })
        .await?;
        let blob: BlobResponse = read_json(response).await?;
        if blob.encoding != "base64" {
            return Err(StorageError::Serialization(format!(
                "Unsupported blob encoding \"{}\" for \"{}\"",
                blob.encoding, scoped.relative
            )));
        }
        decode_content(&scoped.relative, &blob.content)
    }

    async fn put_contents(
        &self,
        scoped: &ScopedPath,
        request: WriteRequest<'_>,
        on_conflict: impl FnOnce() -> StorageError,
    ) -> Result<ContentItem, StorageError> {
        let url = self.contents_url(scoped)?;
        let response = self
            .client
            .send(Method::PUT, url, |req| req.json(&request))
            .await?;
        let response = check_status(response, &scoped.relative, on_conflict).await?;
        let written: WriteResponse = read_json(response).await?;
        Ok(written.content)
    }
}

#[async_trait]
impl StoreRepository for GitHubRepository {
    fn backend_name(&self) -> &'static str {
        "github"
    }

    #[instrument(skip(self, options), level = "debug", fields(data_len = options.content.len()))]
    async fn create_file(
        &self,
        path: &str,
        options: CreateFileOptions,
    ) -> Result<FileEntry, StorageError> {
        let scoped = self.scope(path)?;
        let request = WriteRequest {
            message: &options.message,
            content: encode_content(&options.content),
            sha: None,
            branch: options.branch.as_deref(),
            author: options.author.as_ref(),
            committer: options.committer.as_ref(),
        };

        let written = self
            .put_contents(&scoped, request, || StorageError::AlreadyExists {
                path: scoped.relative.clone(),
            })
            .await?;

        debug!("Created {} (sha {})", scoped.full, written.sha);
        Ok(FileEntry {
            hash: written.sha,
            ..FileEntry::with_content(&scoped.relative, options.content)
        })
    }

    #[instrument(skip(self, options), level = "debug", fields(data_len = options.content.len()))]
    async fn update_file(
        &self,
        path: &str,
        options: UpdateFileOptions,
    ) -> Result<FileEntry, StorageError> {
        let scoped = self.scope(path)?;
        let request = WriteRequest {
            message: &options.message,
            content: encode_content(&options.content),
            sha: Some(&options.hash),
            branch: options.branch.as_deref(),
            author: options.author.as_ref(),
            committer: options.committer.as_ref(),
        };

        let written = self
            .put_contents(&scoped, request, || StorageError::Conflict {
                path: scoped.relative.clone(),
                expected: options.hash.clone(),
                current: None,
            })
            .await?;

        debug!("Updated {} ({} -> {})", scoped.full, options.hash, written.sha);
        Ok(FileEntry {
            hash: written.sha,
            ..FileEntry::with_content(&scoped.relative, options.content)
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn retrieve_file(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileEntry, StorageError> {
        let scoped = self.scope(path)?;
        let item = match self.get_contents(&scoped, git_ref).await? {
            ContentsResponse::Listing(_) => {
                return Err(StorageError::IsDirectory {
                    path: scoped.relative,
                })
            }
            ContentsResponse::Single(item) if item.is_dir() => {
                return Err(StorageError::IsDirectory {
                    path: scoped.relative,
                })
            }
            ContentsResponse::Single(item) => item,
        };

        let content = match (item.encoding.as_deref(), item.content.as_deref()) {
            (Some("base64"), Some(encoded)) => decode_content(&scoped.relative, encoded)?,
            // Over 1 MB the contents API omits the payload
            _ if item.size > 0 => self.fetch_blob(&scoped, &item.sha).await?,
            _ => String::new(),
        };

        Ok(FileEntry {
            content: Some(content),
            encoding: Some(ContentEncoding::Utf8),
            ..self.entry_from_item(&item)
        })
    }

    #[instrument(skip(self, message), level = "debug")]
    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        hash: &str,
        branch: Option<&str>,
    ) -> Result<(), StorageError> {
        let scoped = self.scope(path)?;
        let url = self.contents_url(&scoped)?;
        let request = DeleteRequest {
            message,
            sha: hash,
            branch,
        };

        let response = self
            .client
            .send(Method::DELETE, url, |req| req.json(&request))
            .await?;
        check_status(response, &scoped.relative, || StorageError::Conflict {
            path: scoped.relative.clone(),
            expected: hash.to_string(),
            current: None,
        })
        .await?;

        debug!("Deleted {}", scoped.full);
        Ok(())
    }

    #[instrument(skip(self, options), level = "debug")]
    async fn create_directory(
        &self,
        path: &str,
        options: CreateDirectoryOptions,
    ) -> Result<FileEntry, StorageError> {
        let scoped = self.scope(path)?;
        let marker = if scoped.relative.is_empty() {
            MARKER_FILE_NAME.to_string()
        } else {
            format!("{}/{}", scoped.relative, MARKER_FILE_NAME)
        };

        let create = CreateFileOptions {
            message: options.message,
            content: String::new(),
            branch: options.branch.clone(),
            author: options.author,
            committer: options.committer,
        };

        let hash = match self.create_file(&marker, create).await {
            Ok(entry) => entry.hash,
            Err(StorageError::AlreadyExists { .. }) => {
                debug!("Directory marker {} already present", marker);
                self.retrieve_file(&marker, options.branch.as_deref())
                    .await?
                    .hash
            }
            Err(e) => return Err(e),
        };

        Ok(FileEntry::directory(&scoped.relative, hash))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_directory(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<FileEntry>, StorageError> {
        let scoped = self.scope(path)?;
        let items = match self.get_contents(&scoped, git_ref).await? {
            ContentsResponse::Listing(items) => items,
            ContentsResponse::Single(_) => {
                return Err(StorageError::IsFile {
                    path: scoped.relative,
                })
            }
        };

        let mut entries: Vec<FileEntry> =
            items.iter().map(|item| self.entry_from_item(item)).collect();
        entries.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });

        debug!("Listed {} entries in \"{}\"", entries.len(), scoped.full);
        Ok(entries)
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, path: &str, git_ref: Option<&str>) -> Result<bool, StorageError> {
        let scoped = self.scope(path)?;
        match self.get_contents(&scoped, git_ref).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestore_core::ErrorCode;

    fn repo(base_dir: &str) -> GitHubRepository {
        GitHubRepository::new(GitHubConfig::new("octo", "notes", "tkn").with_base_dir(base_dir))
            .unwrap()
    }

    #[test]
    fn scoping_under_base_dir() {
        let repo = repo("/docs/");
        let scoped = repo.scope("/a//./b.md").unwrap();
        assert_eq!(scoped.relative, "a/b.md");
        assert_eq!(scoped.full, "docs/a/b.md");

        let root = repo.scope("").unwrap();
        assert_eq!(root.full, "docs");

        assert_eq!(repo.unscope("docs/a/b.md"), "a/b.md");
        assert_eq!(repo.unscope("docs"), "");
        assert_eq!(repo.unscope("docsx/a"), "docsx/a");
    }

    #[test]
    fn parent_segments_are_refused() {
        let repo = repo("docs");
        let err = repo.scope("a/../../secret").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);
        let err = repo.scope("a/../b").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);
    }

    #[test]
    fn no_base_dir() {
        let repo = repo("");
        assert_eq!(repo.scope("x/y").unwrap().full, "x/y");
        assert_eq!(repo.unscope("x/y"), "x/y");
    }
}
