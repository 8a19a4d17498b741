//! Key/value blob storage standing in for browser local storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::config::is_valid_storage_key;
use crate::core::errors::{ChatError, ChatResult};

/// Trait for named blob storage.
pub trait BlobStorage: Send + Sync {
    /// Read the blob stored under `key`, or `None` if nothing was stored.
    ///
    /// # Errors
    /// Returns an error if the key is invalid or the backend fails.
    fn load(&self, key: &str) -> ChatResult<Option<String>>;

    /// Replace the blob stored under `key`.
    ///
    /// # Errors
    /// Returns an error if the key is invalid or the backend fails.
    fn save(&self, key: &str, blob: &str) -> ChatResult<()>;

    /// Remove the blob stored under `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    /// Returns an error if the key is invalid or the backend fails.
    fn remove(&self, key: &str) -> ChatResult<()>;
}

fn check_key(key: &str) -> ChatResult<()> {
    if is_valid_storage_key(key) {
        Ok(())
    } else {
        Err(ChatError::InvalidStorageKey(key.to_string()))
    }
}

/// One JSON file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the storage root. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> ChatResult<PathBuf> {
        check_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl BlobStorage for FileStorage {
    fn load(&self, key: &str) -> ChatResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &str, blob: &str) -> ChatResult<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash never leaves a half-written blob.
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn poisoned() -> ChatError {
    ChatError::Io(std::io::Error::other("memory storage lock poisoned"))
}

/// In-process storage, mostly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStorage for MemoryStorage {
    fn load(&self, key: &str) -> ChatResult<Option<String>> {
        check_key(key)?;
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> ChatResult<()> {
        check_key(key)?;
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        check_key(key)?;
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs.remove(key);
        Ok(())
    }
}

/// Load and decode a blob, treating absence and corruption as "first run".
///
/// Corrupt blobs are logged and ignored rather than surfaced, since the
/// caller always has a usable default.
pub fn load_or_default<T>(storage: &dyn BlobStorage, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match storage.load(key) {
        Ok(Some(blob)) => match serde_json::from_str(&blob) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, ?err, "Discarding unreadable stored state");
                T::default()
            }
        },
        Ok(None) => {
            debug!(key, "No stored state, using defaults");
            T::default()
        }
        Err(err) => {
            warn!(key, ?err, "Failed to read stored state");
            T::default()
        }
    }
}

/// A snapshot encoded under the owning store's lock, waiting to be written.
#[derive(Debug)]
pub struct StagedBlob {
    seq: u64,
    blob: String,
}

/// Ordered, non-blocking persistence for one storage key.
///
/// Stores stage a snapshot while holding their state lock, which fixes its
/// place in the mutation order, then commit it after releasing the lock.
/// Commits run the backend on the blocking pool. A snapshot older than the
/// last one written is dropped. Failures are logged, never returned.
pub struct BlobWriter {
    storage: Arc<dyn BlobStorage>,
    key: String,
    staged: AtomicU64,
    written: Mutex<u64>,
}

impl BlobWriter {
    /// Writer for `key` on `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            staged: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    /// Storage key this writer targets.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Encode `value` and reserve the next slot in the write order.
    ///
    /// Returns `None` (after logging) if the value cannot be encoded.
    pub fn stage<T>(&self, value: &T) -> Option<StagedBlob>
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_string(value) {
            Ok(blob) => Some(StagedBlob {
                seq: self.staged.fetch_add(1, Ordering::SeqCst) + 1,
                blob,
            }),
            Err(err) => {
                warn!(key = %self.key, ?err, "Failed to encode state");
                None
            }
        }
    }

    /// Write a staged snapshot unless a newer one already landed.
    pub async fn commit(&self, staged: Option<StagedBlob>) {
        let Some(StagedBlob { seq, blob }) = staged else {
            return;
        };
        let mut written = self.written.lock().await;
        if seq <= *written {
            debug!(key = %self.key, seq, "Skipping superseded snapshot");
            return;
        }

        let storage = Arc::clone(&self.storage);
        let key = self.key.clone();
        match tokio::task::spawn_blocking(move || storage.save(&key, &blob)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(key = %self.key, ?err, "Failed to persist state"),
            Err(err) => warn!(key = %self.key, ?err, "Persist task did not complete"),
        }
        *written = seq;
    }
}
