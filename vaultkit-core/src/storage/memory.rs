//! In-memory store for tests and embedders without persistence.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{
    error::{StorageError, StorageResult},
    keys::{Namespace, StorageKey},
    traits::KeyValueStore,
};

/// A [`KeyValueStore`] backed by a map guarded by a mutex.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<StorageKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutex is poisoned.
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutex is poisoned.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, BTreeMap<StorageKey, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Backend("mutex poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &StorageKey, value: Vec<u8>) -> StorageResult<()> {
        self.lock()?.insert(key.clone(), value);
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> StorageResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self, namespace: Namespace) -> StorageResult<Vec<StorageKey>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|key| key.namespace() == namespace)
            .cloned()
            .collect())
    }
}
