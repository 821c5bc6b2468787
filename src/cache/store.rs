//! Durable key/value storage for cached balances

use crate::error::{FintrackError, FintrackResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::debug;

/// Storage that survives process restarts
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Raw value stored under `key`, if any
    async fn load(&self, key: &str) -> FintrackResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn save(&self, key: &str, value: &str) -> FintrackResult<()>;

    /// Remove `key` if present
    async fn remove(&self, key: &str) -> FintrackResult<()>;

    /// Remove every stored value
    async fn clear(&self) -> FintrackResult<()>;
}

/// One JSON file per key, named by the SHA-256 of the key
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> FintrackResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| FintrackError::io(format!("creating cache dir {}", dir.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&dir, perms)
                .map_err(|e| FintrackError::io("setting cache dir permissions", e))?;
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn load(&self, key: &str) -> FintrackResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FintrackError::io(
                format!("reading cache file {}", path.display()),
                e,
            )),
        }
    }

    async fn save(&self, key: &str, value: &str) -> FintrackResult<()> {
        let path = self.path_for(key);
        fs::write(&path, value)
            .await
            .map_err(|e| FintrackError::io(format!("writing cache file {}", path.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms)
                .map_err(|e| FintrackError::io("setting cache file permissions", e))?;
        }

        debug!("Stored {} at {}", key, path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> FintrackResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FintrackError::io(
                format!("removing cache file {}", path.display()),
                e,
            )),
        }
    }

    async fn clear(&self) -> FintrackResult<()> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| FintrackError::io("reading cache directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FintrackError::io("reading cache entry", e))?
        {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(entry.path())
                    .await
                    .map_err(|e| FintrackError::io("removing cache file", e))?;
            }
        }

        Ok(())
    }
}

/// Process-local store, for `cache.persist = false` and tests
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load(&self, key: &str) -> FintrackResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> FintrackResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> FintrackResult<()> {
        self.entries().remove(key);
        Ok(())
    }

    async fn clear(&self) -> FintrackResult<()> {
        self.entries().clear();
        Ok(())
    }
}
