//! File-backed store: one JSON map, replaced atomically on every write.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::sync::Mutex;

use super::{
    error::{StorageError, StorageResult},
    keys::{Namespace, StorageKey},
    traits::KeyValueStore,
};

/// A [`KeyValueStore`] persisted as a single JSON document.
///
/// Values are base64 encoded. Writes go to a sibling temp file which is then
/// renamed over the original, so a crash never leaves a torn file behind.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| StorageError::Serialization(err.to_string()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` on the blocking pool and hands them back once on disk.
    async fn persist(
        &self,
        entries: BTreeMap<String, String>,
    ) -> StorageResult<BTreeMap<String, String>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> StorageResult<_> {
            let bytes = serde_json::to_vec_pretty(&entries)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, bytes)?;
            fs::rename(&tmp, &path)?;
            Ok(entries)
        })
        .await
        .map_err(|err| StorageError::Backend(format!("storage task failed: {err}")))?
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().await;
        entries
            .get(&key.to_string())
            .map(|value| {
                STANDARD
                    .decode(value)
                    .map_err(|err| StorageError::Serialization(err.to_string()))
            })
            .transpose()
    }

    async fn set(&self, key: &StorageKey, value: Vec<u8>) -> StorageResult<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), STANDARD.encode(value));
        *entries = self.persist(next).await?;
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> StorageResult<()> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(&key.to_string()) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(&key.to_string());
        *entries = self.persist(next).await?;
        Ok(())
    }

    async fn keys(&self, namespace: Namespace) -> StorageResult<Vec<StorageKey>> {
        let entries = self.entries.lock().await;
        entries
            .keys()
            .map(|raw| raw.parse::<StorageKey>())
            .filter(|key| !matches!(key, Ok(key) if key.namespace() != namespace))
            .collect()
    }
}
