//! Platform interface for durable key-value storage.

use async_trait::async_trait;

use super::{
    error::StorageResult,
    keys::{Namespace, StorageKey},
};
use crate::config::Network;

/// Key-value persistence with per-entity namespaces.
///
/// Only single-key operations are atomic. Callers sequence multi-key mutations
/// themselves.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value at `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn get(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>>;

    /// Writes `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set(&self, key: &StorageKey, value: Vec<u8>) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    async fn remove(&self, key: &StorageKey) -> StorageResult<()>;

    /// Lists every key stored under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    async fn keys(&self, namespace: Namespace) -> StorageResult<Vec<StorageKey>>;

    /// Removes every key in `namespace` that belongs to `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or any delete fails.
    async fn remove_all_matching_network(
        &self,
        namespace: Namespace,
        network: Network,
    ) -> StorageResult<()> {
        for key in self.keys(namespace).await? {
            if key.matches_network(network) {
                self.remove(&key).await?;
            }
        }
        Ok(())
    }

    /// Removes every key in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or any delete fails.
    async fn remove_namespace(&self, namespace: Namespace) -> StorageResult<()> {
        for key in self.keys(namespace).await? {
            self.remove(&key).await?;
        }
        Ok(())
    }
}
