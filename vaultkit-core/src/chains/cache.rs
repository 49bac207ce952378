//! Per-account chain caches (balances, activity cursors).

use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock},
};

use crate::{accounts::AccountId, config::Network};

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    balances: BTreeMap<String, u128>,
    activity_cursor: Option<String>,
}

/// Cached chain state, keyed by account.
///
/// Cache contents are disposable, so a poisoned lock is recovered rather than
/// reported.
#[derive(Debug, Default)]
pub struct ChainCache {
    entries: RwLock<HashMap<AccountId, CacheEntry>>,
}

impl ChainCache {
    /// Records a token balance.
    pub fn set_balance(&self, account_id: &AccountId, token: &str, amount: u128) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(account_id.clone())
            .or_default()
            .balances
            .insert(token.to_string(), amount);
    }

    /// A cached token balance.
    #[must_use]
    pub fn balance(&self, account_id: &AccountId, token: &str) -> Option<u128> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_id)
            .and_then(|entry| entry.balances.get(token).copied())
    }

    /// Records where activity polling left off.
    pub fn set_activity_cursor(&self, account_id: &AccountId, cursor: String) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(account_id.clone())
            .or_default()
            .activity_cursor = Some(cursor);
    }

    /// Where activity polling left off.
    #[must_use]
    pub fn activity_cursor(&self, account_id: &AccountId) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_id)
            .and_then(|entry| entry.activity_cursor.clone())
    }

    /// Whether anything is cached for `account_id`.
    #[must_use]
    pub fn contains(&self, account_id: &AccountId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(account_id)
    }

    /// Number of cached accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear_account(&self, account_id: &AccountId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(account_id);
    }

    pub(crate) fn clear_network(&self, network: Network) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|account_id, _| account_id.network() != network);
    }

    pub(crate) fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
