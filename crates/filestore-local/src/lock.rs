//! Writer serialization for the local backend.
//!
//! Two layers: an in-process async mutex per path, and an exclusive advisory
//! lock (`fs2`) on a lock file under the metadata directory that serializes
//! writers from other processes sharing the same root.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use filestore_core::StorageError;
use fs2::FileExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type LockMap = DashMap<PathBuf, Arc<Mutex<()>>>;

/// Held for the duration of one mutation. Dropping it releases both locks.
pub struct PathGuard {
    file: File,
    key: PathBuf,
    locks: Arc<LockMap>,
    _local: OwnedMutexGuard<()>,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        // The map and this guard hold the only references when nobody waits.
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}

#[derive(Debug)]
pub struct PathLocks {
    locks: Arc<LockMap>,
    lock_file: PathBuf,
}

impl PathLocks {
    pub fn new(lock_file: PathBuf) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            lock_file,
        }
    }

    /// Number of paths with a held or awaited lock.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.len()
    }

    /// Acquire exclusive write access to `key`.
    pub async fn acquire(&self, key: &Path) -> Result<PathGuard, StorageError> {
        let mutex = self
            .locks
            .entry(key.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let local = mutex.lock_owned().await;

        let lock_file = self.lock_file.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            if let Some(parent) = lock_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_file)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| {
            StorageError::io(
                self.lock_file.display().to_string(),
                std::io::Error::other(e),
            )
        })?
        .map_err(|e| StorageError::io(self.lock_file.display().to_string(), e))?;

        debug!("Acquired write lock for {}", key.display());
        Ok(PathGuard {
            file,
            key: key.to_path_buf(),
            locks: self.locks.clone(),
            _local: local,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn same_path_is_serialized() {
        let dir = TempDir::new().unwrap();
        let locks = Arc::new(PathLocks::new(dir.path().join(".metadata/.lock")));
        let key = dir.path().join("a.txt");

        let guard = locks.acquire(&key).await.unwrap();

        let contender = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn released_paths_are_forgotten() {
        let dir = TempDir::new().unwrap();
        let locks = Arc::new(PathLocks::new(dir.path().join(".metadata/.lock")));

        for i in 0..20 {
            let key = dir.path().join(format!("f{}.txt", i));
            let _guard = locks.acquire(&key).await.unwrap();
        }
        assert_eq!(locks.tracked(), 0);

        // A waiter keeps the entry alive until it is done too
        let key = dir.path().join("a.txt");
        let guard = locks.acquire(&key).await.unwrap();
        let contender = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);
        assert_eq!(locks.tracked(), 1);

        tokio::time::timeout(Duration::from_secs(5), contender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn lock_file_is_created() {
        let dir = TempDir::new().unwrap();
        let lock_file = dir.path().join(".metadata/.lock");
        let locks = PathLocks::new(lock_file.clone());

        let _guard = locks.acquire(&dir.path().join("x")).await.unwrap();
        assert!(lock_file.exists());
    }
}
