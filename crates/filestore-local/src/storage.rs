use std::io;
use std::path::Path;

use async_trait::async_trait;
use filestore_core::{
    blob_hash, ContentEncoding, CreateDirectoryOptions, CreateFileOptions, FileEntry, StorageError,
    StoreRepository, UpdateFileOptions, MARKER_FILE_NAME,
};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::atomic::{publish_exclusive, write_atomic};
use crate::config::LocalConfig;
use crate::lock::PathLocks;
use crate::metadata::{FileMetadata, MetadataStore};
use crate::sandbox::{child_path, ResolvedPath, Sandbox, METADATA_DIR};

/// Aggregate counters over the whole root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalStats {
    pub total_files: u64,
    pub total_directories: u64,
    pub total_size: u64,
}

/// Local filesystem backend confined to a root directory.
///
/// Storage layout:
/// ```text
/// {root}/
///   {path...}                      # file content, as-is
///   .metadata/
///     .lock                        # cross-process writer lock
///     {escaped-path}.meta.json     # sidecar version record
/// ```
///
/// Content is authoritative: hashes are always derived from the stored bytes,
/// and a sidecar that disagrees is reported as stale.
#[derive(Debug)]
pub struct LocalRepository {
    sandbox: Sandbox,
    metadata: MetadataStore,
    locks: PathLocks,
    create_if_missing: bool,
}

impl LocalRepository {
    /// Open (and if configured, create) a repository rooted at `config.root`.
    pub async fn open(config: LocalConfig) -> Result<Self, StorageError> {
        if config.create_if_missing {
            fs::create_dir_all(&config.root)
                .await
                .map_err(|e| StorageError::io(config.root.display().to_string(), e))?;
        }

        let root = fs::canonicalize(&config.root)
            .await
            .map_err(|e| StorageError::io(config.root.display().to_string(), e))?;

        let attr = fs::metadata(&root)
            .await
            .map_err(|e| StorageError::io(root.display().to_string(), e))?;
        if !attr.is_dir() {
            return Err(StorageError::Validation(format!(
                "Storage root {} must be a directory",
                root.display()
            )));
        }

        let metadata = MetadataStore::new(&root);
        let locks = PathLocks::new(metadata.dir().join(".lock"));
        let repo = Self {
            sandbox: Sandbox::new(root),
            metadata,
            locks,
            create_if_missing: config.create_if_missing,
        };
        repo.initialize().await?;

        info!("Local repository ready at {}", repo.root().display());
        Ok(repo)
    }

    /// Absolute path of the root directory.
    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    /// Create the root and metadata directories. Idempotent.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        if !self.create_if_missing {
            return match fs::try_exists(self.root()).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(StorageError::NotFound {
                    path: self.root().display().to_string(),
                }),
                Err(e) => Err(StorageError::io(self.root().display().to_string(), e)),
            };
        }
        for dir in [self.root(), self.metadata.dir()] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        }
        Ok(())
    }

    /// Remove the root directory with everything in it.
    pub async fn cleanup(&self) -> Result<(), StorageError> {
        match fs::remove_dir_all(self.root()).await {
            Ok(()) => {
                info!("Removed local repository at {}", self.root().display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(self.root().display().to_string(), e)),
        }
    }

    /// Walk the whole root (metadata excluded) and count files, directories
    /// and bytes. Directory markers are not counted as files.
    pub async fn stats(&self) -> Result<LocalStats, StorageError> {
        self.initialize().await?;

        let mut stats = LocalStats::default();
        let mut pending = vec![self.root().to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to read directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read entry in {}: {}", dir.display(), e);
                        break;
                    }
                };
                let name = entry.file_name().to_string_lossy().to_string();
                if dir == self.root() && name == METADATA_DIR {
                    continue;
                }
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(_) => continue,
                };
                if file_type.is_dir() {
                    stats.total_directories += 1;
                    pending.push(entry.path());
                } else if file_type.is_file() && name != MARKER_FILE_NAME {
                    stats.total_files += 1;
                    stats.total_size += entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                }
            }
        }

        debug!(
            "Stats for {}: {} files, {} directories, {} bytes",
            self.root().display(),
            stats.total_files,
            stats.total_directories,
            stats.total_size
        );
        Ok(stats)
    }

    /// Hash of the stored content, cross-checked against the sidecar.
    async fn current_hash(&self, relative: &str, content: &[u8]) -> String {
        let live = blob_hash(content);
        if let Some(meta) = self.metadata.load(relative).await {
            if meta.hash != live {
                warn!(
                    "Stale metadata for \"{}\": recorded {}, content hashes to {}",
                    relative, meta.hash, live
                );
            }
        }
        live
    }

    /// Stat a path that must be an existing file.
    async fn require_file(&self, target: &ResolvedPath) -> Result<(), StorageError> {
        match fs::metadata(&target.full).await {
            Ok(attr) if attr.is_dir() => Err(StorageError::IsDirectory {
                path: target.relative.clone(),
            }),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: target.relative.clone(),
            }),
            Err(e) => Err(StorageError::io(target.full.display().to_string(), e)),
        }
    }

    async fn read_content(&self, target: &ResolvedPath) -> Result<Vec<u8>, StorageError> {
        fs::read(&target.full).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                path: target.relative.clone(),
            },
            _ => StorageError::io(target.full.display().to_string(), e),
        })
    }

    /// Write a sidecar; failures are logged since sidecars are advisory.
    async fn record_metadata(&self, relative: &str, metadata: FileMetadata) {
        if let Err(e) = self.metadata.save(relative, &metadata).await {
            warn!("Failed to save metadata for \"{}\": {}", relative, e);
        }
    }
}

fn decode_utf8(relative: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
    String::from_utf8(bytes).map_err(|_| {
        StorageError::Serialization(format!("File \"{}\" is not valid UTF-8", relative))
    })
}

#[async_trait]
impl StoreRepository for LocalRepository {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self, options), level = "debug", fields(data_len = options.content.len()))]
    async fn create_file(
        &self,
        path: &str,
        options: CreateFileOptions,
    ) -> Result<FileEntry, StorageError> {
        self.initialize().await?;
        let target = self.sandbox.resolve(path).await?;
        let _guard = self.locks.acquire(&target.full).await?;

        if fs::try_exists(&target.full)
            .await
            .map_err(|e| StorageError::io(target.full.display().to_string(), e))?
        {
            return Err(StorageError::AlreadyExists {
                path: target.relative,
            });
        }

        if let Some(parent) = target.full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent.display().to_string(), e))?;
        }

        publish_exclusive(&target.full, options.content.as_bytes())
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                    path: target.relative.clone(),
                },
                _ => StorageError::io(target.full.display().to_string(), e),
            })?;

        let entry = FileEntry::with_content(&target.relative, options.content);
        self.record_metadata(
            &target.relative,
            FileMetadata::new(
                entry.hash.clone(),
                &options.message,
                options.author,
                options.committer,
            ),
        )
        .await;

        debug!(
            "Created {} ({} bytes, hash {})",
            target.relative, entry.size_bytes, entry.hash
        );
        Ok(entry)
    }

    #[instrument(skip(self, options), level = "debug", fields(data_len = options.content.len()))]
    async fn update_file(
        &self,
        path: &str,
        options: UpdateFileOptions,
    ) -> Result<FileEntry, StorageError> {
        self.initialize().await?;
        let target = self.sandbox.resolve(path).await?;
        let _guard = self.locks.acquire(&target.full).await?;

        self.require_file(&target).await?;
        let stored = self.read_content(&target).await?;
        let current = self.current_hash(&target.relative, &stored).await;
        if current != options.hash {
            return Err(StorageError::Conflict {
                path: target.relative,
                expected: options.hash,
                current: Some(current),
            });
        }

        write_atomic(&target.full, options.content.as_bytes())
            .await
            .map_err(|e| StorageError::io(target.full.display().to_string(), e))?;

        let entry = FileEntry::with_content(&target.relative, options.content);
        self.record_metadata(
            &target.relative,
            FileMetadata::new(
                entry.hash.clone(),
                &options.message,
                options.author,
                options.committer,
            ),
        )
        .await;

        debug!(
            "Updated {} ({} -> {}, {} bytes)",
            target.relative, current, entry.hash, entry.size_bytes
        );
        Ok(entry)
    }

    #[instrument(skip(self), level = "debug")]
    async fn retrieve_file(
        &self,
        path: &str,
        _git_ref: Option<&str>,
    ) -> Result<FileEntry, StorageError> {
        let target = self.sandbox.resolve(path).await?;
        self.require_file(&target).await?;

        let bytes = self.read_content(&target).await?;
        let hash = self.current_hash(&target.relative, &bytes).await;
        let size = bytes.len() as u64;
        let content = decode_utf8(&target.relative, bytes)?;

        Ok(FileEntry {
            content: Some(content),
            encoding: Some(ContentEncoding::Utf8),
            ..FileEntry::file(&target.relative, hash, size)
        })
    }

    #[instrument(skip(self, message), level = "debug")]
    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        hash: &str,
        _branch: Option<&str>,
    ) -> Result<(), StorageError> {
        let target = self.sandbox.resolve(path).await?;
        let _guard = self.locks.acquire(&target.full).await?;

        self.require_file(&target).await?;
        let stored = self.read_content(&target).await?;
        let current = self.current_hash(&target.relative, &stored).await;
        if current != hash {
            return Err(StorageError::Conflict {
                path: target.relative,
                expected: hash.to_string(),
                current: Some(current),
            });
        }

        fs::remove_file(&target.full).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                path: target.relative.clone(),
            },
            _ => StorageError::io(target.full.display().to_string(), e),
        })?;

        self.metadata.remove(&target.relative).await;

        debug!("Deleted {} ({})", target.relative, message);
        Ok(())
    }

    #[instrument(skip(self, options), level = "debug")]
    async fn create_directory(
        &self,
        path: &str,
        options: CreateDirectoryOptions,
    ) -> Result<FileEntry, StorageError> {
        self.initialize().await?;
        let target = self.sandbox.resolve(path).await?;
        let _guard = self.locks.acquire(&target.full).await?;

        if let Ok(attr) = fs::metadata(&target.full).await {
            if !attr.is_dir() {
                return Err(StorageError::IsFile {
                    path: target.relative,
                });
            }
        }

        fs::create_dir_all(&target.full)
            .await
            .map_err(|e| StorageError::io(target.full.display().to_string(), e))?;

        let marker = target.full.join(MARKER_FILE_NAME);
        match publish_exclusive(&marker, b"").await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(StorageError::io(marker.display().to_string(), e)),
        }

        let hash = blob_hash(b"");
        self.record_metadata(
            &target.relative,
            FileMetadata::new(
                hash.clone(),
                &options.message,
                options.author,
                options.committer,
            ),
        )
        .await;

        debug!("Created directory {}", target.relative);
        Ok(FileEntry::directory(&target.relative, hash))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_directory(
        &self,
        path: &str,
        _git_ref: Option<&str>,
    ) -> Result<Vec<FileEntry>, StorageError> {
        let target = self.sandbox.resolve(path).await?;

        match fs::metadata(&target.full).await {
            Ok(attr) if !attr.is_dir() => {
                return Err(StorageError::IsFile {
                    path: target.relative,
                })
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    path: target.relative,
                })
            }
            Err(e) => return Err(StorageError::io(target.full.display().to_string(), e)),
        }

        let mut read_dir = fs::read_dir(&target.full)
            .await
            .map_err(|e| StorageError::io(target.full.display().to_string(), e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io(target.full.display().to_string(), e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();

            // Skip hidden files (metadata, temp files) but keep directory markers
            if name.starts_with('.') && name != MARKER_FILE_NAME {
                continue;
            }

            let relative = child_path(&target.relative, &name);
            // Symlinks are followed only while they stay inside the root.
            let child = match self.sandbox.resolve(&relative).await {
                Ok(child) => child,
                Err(_) => {
                    warn!("Skipping {}: resolves outside the root", relative);
                    continue;
                }
            };

            let attr = match fs::metadata(&child.full).await {
                Ok(attr) => attr,
                Err(_) => continue,
            };

            if attr.is_dir() {
                let hash = self
                    .metadata
                    .load(&relative)
                    .await
                    .map(|m| m.hash)
                    .unwrap_or_else(|| blob_hash(b""));
                entries.push(FileEntry::directory(&relative, hash));
            } else if attr.is_file() {
                let bytes = match fs::read(&child.full).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Skipping unreadable file {}: {}", relative, e);
                        continue;
                    }
                };
                entries.push(FileEntry::file(
                    &relative,
                    blob_hash(&bytes),
                    bytes.len() as u64,
                ));
            }
        }

        // Directories first, then by name
        entries.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });

        debug!("Listed {} entries in \"{}\"", entries.len(), target.relative);
        Ok(entries)
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, path: &str, _git_ref: Option<&str>) -> Result<bool, StorageError> {
        let target = self.sandbox.resolve(path).await?;
        fs::try_exists(&target.full)
            .await
            .map_err(|e| StorageError::io(target.full.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestore_core::{EntryKind, ErrorCode};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup() -> (LocalRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let repo = LocalRepository::open(LocalConfig::new(temp_dir.path().join("data")))
            .await
            .unwrap();
        (repo, temp_dir)
    }

    fn create(content: &str) -> CreateFileOptions {
        CreateFileOptions {
            message: "create".to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    fn update(content: &str, hash: &str) -> UpdateFileOptions {
        UpdateFileOptions {
            message: "update".to_string(),
            content: content.to_string(),
            hash: hash.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_retrieve() {
        let (repo, _dir) = setup().await;

        let created = repo.create_file("a/b.txt", create("hello")).await.unwrap();
        assert_eq!(created.content.as_deref(), Some("hello"));
        assert_eq!(created.hash, blob_hash(b"hello"));
        assert_eq!(created.size_bytes, 5);

        let retrieved = repo.retrieve_file("a/b.txt", None).await.unwrap();
        assert_eq!(retrieved.content.as_deref(), Some("hello"));
        assert_eq!(retrieved.hash, created.hash);
        assert_eq!(retrieved.name, "b.txt");
        assert_eq!(retrieved.path, "a/b.txt");

        // Sidecar written next to the content
        assert!(repo
            .root()
            .join(".metadata")
            .join("a%2Fb.txt.meta.json")
            .exists());
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let (repo, _dir) = setup().await;

        repo.create_file("x.txt", create("one")).await.unwrap();
        let err = repo.create_file("x.txt", create("two")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);

        let stored = repo.retrieve_file("x.txt", None).await.unwrap();
        assert_eq!(stored.content.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_create_under_file_reports_io_error() {
        let (repo, _dir) = setup().await;

        repo.create_file("x.txt", create("one")).await.unwrap();
        let err = repo.create_file("x.txt/y.txt", create("two")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Io);

        let stored = repo.retrieve_file("x.txt", None).await.unwrap();
        assert_eq!(stored.content.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_concurrent_creates_have_one_winner() {
        let (repo, _dir) = setup().await;
        let repo = Arc::new(repo);

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create_file("race.txt", create(&format!("writer {}", i)))
                    .await
            }));
        }

        let mut won = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(e) => assert_eq!(e.code(), ErrorCode::AlreadyExists),
            }
        }
        assert_eq!(won, 1);
    }

    #[tokio::test]
    async fn test_update_scenario_with_stale_hash() {
        let (repo, _dir) = setup().await;

        let h1 = repo.create_file("a/b.txt", create("hello")).await.unwrap().hash;
        let updated = repo.update_file("a/b.txt", update("world", &h1)).await.unwrap();
        let h2 = updated.hash.clone();
        assert_ne!(h1, h2);
        assert_eq!(updated.content.as_deref(), Some("world"));

        let err = repo
            .update_file("a/b.txt", update("stale", &h1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        let stored = repo.retrieve_file("a/b.txt", None).await.unwrap();
        assert_eq!(stored.content.as_deref(), Some("world"));
        assert_eq!(stored.hash, h2);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (repo, _dir) = setup().await;
        let err = repo
            .update_file("nope.txt", update("x", "abc"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_hash_without_sidecar() {
        let (repo, _dir) = setup().await;

        // Written behind the backend's back: no sidecar
        fs::write(repo.root().join("raw.txt"), "hello").await.unwrap();

        let entry = repo.retrieve_file("raw.txt", None).await.unwrap();
        assert_eq!(entry.hash, blob_hash(b"hello"));

        let updated = repo
            .update_file("raw.txt", update("bye", &entry.hash))
            .await
            .unwrap();
        assert_eq!(updated.hash, blob_hash(b"bye"));
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, _dir) = setup().await;

        let created = repo.create_file("gone.txt", create("bye")).await.unwrap();

        let err = repo
            .delete_file("gone.txt", "delete", "0000", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(repo.exists("gone.txt", None).await.unwrap());

        repo.delete_file("gone.txt", "delete", &created.hash, None)
            .await
            .unwrap();

        let err = repo.retrieve_file("gone.txt", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(!repo.exists("gone.txt", None).await.unwrap());
        assert!(!repo
            .root()
            .join(".metadata")
            .join("gone.txt.meta.json")
            .exists());
    }

    #[tokio::test]
    async fn test_retrieve_directory_fails() {
        let (repo, _dir) = setup().await;
        repo.create_directory("docs", CreateDirectoryOptions::default())
            .await
            .unwrap();

        let err = repo.retrieve_file("docs", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IsDirectory);
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let (repo, _dir) = setup().await;

        let err = repo
            .retrieve_file("../../etc/passwd", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);

        let err = repo
            .create_file("../escape.txt", create("x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);
        assert!(!repo.root().parent().unwrap().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_create_directory_and_list() {
        let (repo, _dir) = setup().await;

        let dir = repo
            .create_directory("proj", CreateDirectoryOptions::default())
            .await
            .unwrap();
        assert_eq!(dir.kind, EntryKind::Dir);
        assert_eq!(dir.hash, blob_hash(b""));

        // Idempotent
        repo.create_directory("proj", CreateDirectoryOptions::default())
            .await
            .unwrap();

        repo.create_file("proj/readme.md", create("# hi")).await.unwrap();
        repo.create_file("proj/src/main.rs", create("fn main() {}"))
            .await
            .unwrap();
        fs::write(repo.root().join("proj/.hidden"), "x").await.unwrap();

        let entries = repo.list_directory("proj", None).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["src", ".gitkeep", "readme.md"]);
        assert!(entries[0].is_dir());
        assert!(entries[1].is_marker());
        assert_eq!(entries[2].hash, blob_hash(b"# hi"));
        assert!(entries.iter().all(|e| e.content.is_none()));

        // Root listing hides the metadata directory
        let root = repo.list_directory("", None).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].path, "proj");
    }

    #[tokio::test]
    async fn test_list_file_fails() {
        let (repo, _dir) = setup().await;
        repo.create_file("f.txt", create("x")).await.unwrap();

        let err = repo.list_directory("f.txt", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IsFile);

        let err = repo.list_directory("missing", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_create_or_update() {
        let (repo, _dir) = setup().await;

        let first = repo
            .create_or_update_file("cfg.json", create("{}"))
            .await
            .unwrap();
        let second = repo
            .create_or_update_file("cfg.json", create("{\"a\":1}"))
            .await
            .unwrap();

        assert_ne!(first.hash, second.hash);
        let stored = repo.retrieve_file("cfg.json", None).await.unwrap();
        assert_eq!(stored.content.as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_stats_and_cleanup() {
        let (repo, _dir) = setup().await;

        repo.create_directory("d", CreateDirectoryOptions::default())
            .await
            .unwrap();
        repo.create_file("d/a.txt", create("abc")).await.unwrap();
        repo.create_file("b.txt", create("12345")).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(
            stats,
            LocalStats {
                total_files: 2,
                total_directories: 1,
                total_size: 8,
            }
        );

        repo.cleanup().await.unwrap();
        assert!(!repo.root().exists());

        // Reads on a removed root find nothing rather than escaping it
        assert!(!repo.exists("b.txt", None).await.unwrap());
        let err = repo.retrieve_file("d/a.txt", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err = repo.list_directory("d", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err = repo.delete_file("b.txt", "rm", "deadbeef", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err = repo.retrieve_file("../outside.txt", None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathOutsideBounds);

        // Operations re-initialize the root
        repo.create_file("again.txt", create("x")).await.unwrap();
        assert!(repo.root().join("again.txt").exists());
    }
}
