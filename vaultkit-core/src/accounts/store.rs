//! The account identity store.
//!
//! Owns every account record. Multi-key mutations are serialized through one
//! async mutex so that a create followed by an activate never observes a
//! partially written account.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use backon::{ConstantBuilder, Retryable};
use tokio::sync::{watch, Mutex};

use super::{default_title, Account, AccountId, AccountSecret};
use crate::{
    chains::{Chain, ChainRegistry},
    config::Network,
    error::{WalletError, WalletResult},
    storage::{
        envelope::{open_record, seal_record},
        KeyValueStore, Namespace, StorageKey, StorageResult,
    },
    vault::EncryptedMnemonic,
};

const REMOVAL_ATTEMPTS: usize = 3;
const REMOVAL_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Persistent account records, the current-account pointer and id allocation.
pub struct AccountStore {
    storage: Arc<dyn KeyValueStore>,
    chains: ChainRegistry,
    mutation: Mutex<()>,
    current: watch::Sender<Option<AccountId>>,
}

impl AccountStore {
    /// Opens the store, loading the persisted current-account pointer.
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer cannot be read.
    pub async fn open(
        storage: Arc<dyn KeyValueStore>,
        chains: ChainRegistry,
    ) -> WalletResult<Self> {
        let current = storage
            .get(&StorageKey::unscoped(Namespace::CurrentAccountId))
            .await?
            .map(|bytes| open_record::<AccountId>(&bytes))
            .transpose()?;
        Ok(Self {
            storage,
            chains,
            mutation: Mutex::new(()),
            current: watch::Sender::new(current),
        })
    }

    /// The chain modules whose caches this store invalidates.
    #[must_use]
    pub const fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    /// Observes the current account. `None` while deactivated.
    #[must_use]
    pub fn subscribe_current(&self) -> watch::Receiver<Option<AccountId>> {
        self.current.subscribe()
    }

    /// The current account, if any.
    #[must_use]
    pub fn current_account_id(&self) -> Option<AccountId> {
        self.current.borrow().clone()
    }

    /// Persists a new account and returns its fresh id. Untitled accounts get
    /// the default title. The account is not activated.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any write fails.
    pub async fn create_account(
        &self,
        network: Network,
        account: Account,
    ) -> WalletResult<AccountId> {
        let _guard = self.mutation.lock().await;
        let account_id = self.allocate_id(network).await?;
        self.insert(&account_id, account).await?;
        tracing::info!(%account_id, "account created");
        Ok(account_id)
    }

    /// Persists an account under a caller-chosen id, used for shadow accounts
    /// that mirror an index on the paired network.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] if the id is taken.
    pub async fn create_account_with_id(
        &self,
        account_id: &AccountId,
        account: Account,
    ) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        if self.load(account_id).await?.is_some() {
            return Err(WalletError::invalid_input(
                "account_id",
                format!("{account_id} already exists"),
            ));
        }
        let counter = self.next_index(account_id.network()).await?;
        if account_id.index() >= counter {
            self.write_counter(account_id.network(), account_id.index() + 1)
                .await?;
        }
        self.insert(account_id, account).await?;
        tracing::info!(%account_id, "account created");
        Ok(())
    }

    /// Reads one account.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be read or decoded.
    pub async fn get_account(&self, account_id: &AccountId) -> WalletResult<Option<Account>> {
        self.load(account_id).await
    }

    /// Reads one account, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::AccountNotFound`] for unknown ids.
    pub async fn require_account(&self, account_id: &AccountId) -> WalletResult<Account> {
        self.load(account_id)
            .await?
            .ok_or_else(|| WalletError::AccountNotFound(account_id.to_string()))
    }

    /// Every account, optionally filtered by network, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if listing or decoding fails.
    pub async fn list_accounts(
        &self,
        network: Option<Network>,
    ) -> WalletResult<Vec<(AccountId, Account)>> {
        let mut accounts = Vec::new();
        for key in self.storage.keys(Namespace::Accounts).await? {
            let Some(account_id) = key.account_id() else {
                tracing::warn!(%key, "skipping account key without an account id");
                continue;
            };
            if network.is_some_and(|network| account_id.network() != network) {
                continue;
            }
            if let Some(account) = self.load(&account_id).await? {
                accounts.push((account_id, account));
            }
        }
        accounts.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(accounts)
    }

    /// Address per chain for one account.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::AccountNotFound`] for unknown ids.
    pub async fn get_addresses_from_account(
        &self,
        account_id: &AccountId,
    ) -> WalletResult<BTreeMap<Chain, String>> {
        Ok(self.require_account(account_id).await?.addresses())
    }

    /// Makes `account_id` current and drops the previous account's chain caches.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::AccountNotFound`] for unknown ids.
    pub async fn activate_account(&self, account_id: &AccountId) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        self.require_account(account_id).await?;
        self.set_current(account_id).await
    }

    /// Clears the current-account pointer. Observers see `None` before any
    /// bulk deletion starts.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the pointer cannot be removed.
    pub async fn deactivate_all_accounts(&self) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        self.clear_current().await
    }

    /// Sets the user-facing label.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::AccountNotFound`] for unknown ids.
    pub async fn rename_account(&self, account_id: &AccountId, title: &str) -> WalletResult<()> {
        self.update(account_id, |account| account.title = Some(title.to_string()))
            .await
    }

    /// Flags whether the user still owes a backup check.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::AccountNotFound`] for unknown ids.
    pub async fn set_backup_required(
        &self,
        account_id: &AccountId,
        is_backup_required: bool,
    ) -> WalletResult<()> {
        self.update(account_id, |account| {
            account.is_backup_required = is_backup_required;
        })
        .await
    }

    /// Overwrites an existing record, keeping its id.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::AccountNotFound`] for unknown ids.
    pub async fn replace_account(&self, account_id: &AccountId, account: Account) -> WalletResult<()> {
        self.update(account_id, |stored| *stored = account).await
    }

    /// Deletes an account with its linked records and chain caches, then makes
    /// `next_account_id` current.
    ///
    /// Linked records go first and the account record last, each removal retried
    /// and idempotent. A failure leaves the account in place so the whole call can
    /// simply be repeated.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] if `next_account_id` is the removed
    /// account or does not exist, or a storage error after retries run out.
    pub async fn remove_account(
        &self,
        account_id: &AccountId,
        next_account_id: &AccountId,
    ) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        if account_id == next_account_id || self.load(next_account_id).await?.is_none() {
            return Err(WalletError::invalid_input(
                "next_account_id",
                format!("{next_account_id} cannot replace {account_id}"),
            ));
        }

        self.remove_records(account_id).await?;
        tracing::info!(%account_id, %next_account_id, "account removed");

        self.set_current(next_account_id).await
    }

    /// Deletes every account on `network`, after deactivating the current one.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any deletion fails.
    pub async fn remove_network_accounts(&self, network: Network) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        self.clear_current().await?;
        for namespace in Namespace::ACCOUNT_SCOPED {
            self.storage
                .remove_all_matching_network(namespace, network)
                .await?;
        }
        self.chains.clear_accounts_cache_by_network(network);
        tracing::info!(%network, "network accounts removed");
        Ok(())
    }

    /// Deletes every account on every network, after deactivating.
    ///
    /// Id counters survive, so ids are not reused afterwards.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any deletion fails.
    pub async fn reset_accounts(&self) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        self.clear_current().await?;
        for namespace in Namespace::ACCOUNT_SCOPED {
            self.storage.remove_namespace(namespace).await?;
        }
        self.chains.clear_accounts_cache();
        tracing::info!("all accounts removed");
        Ok(())
    }

    /// Deletes an account that never became current, with its linked records.
    /// The current-account pointer is left alone.
    pub(crate) async fn discard_account(&self, account_id: &AccountId) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        self.remove_records(account_id).await?;
        tracing::info!(%account_id, "account discarded");
        Ok(())
    }

    pub(crate) async fn encrypted_mnemonics(
        &self,
    ) -> WalletResult<Vec<(AccountId, EncryptedMnemonic)>> {
        Ok(self
            .list_accounts(None)
            .await?
            .into_iter()
            .filter_map(|(account_id, account)| {
                account
                    .encrypted_mnemonic()
                    .cloned()
                    .map(|encrypted| (account_id, encrypted))
            })
            .collect())
    }

    pub(crate) async fn first_encrypted_mnemonic(
        &self,
    ) -> WalletResult<Option<(AccountId, EncryptedMnemonic)>> {
        Ok(self.encrypted_mnemonics().await?.into_iter().next())
    }

    pub(crate) async fn replace_encrypted_mnemonic(
        &self,
        account_id: &AccountId,
        replacement: EncryptedMnemonic,
    ) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        let mut account = self.require_account(account_id).await?;
        match &mut account.secret {
            AccountSecret::Mnemonic { encrypted, .. } => *encrypted = replacement,
            _ => {
                return Err(WalletError::invalid_input(
                    "account_id",
                    format!("{account_id} holds no mnemonic"),
                ))
            }
        }
        self.write(account_id, &account).await
    }

    async fn update(
        &self,
        account_id: &AccountId,
        apply: impl FnOnce(&mut Account) + Send,
    ) -> WalletResult<()> {
        let _guard = self.mutation.lock().await;
        let mut account = self.require_account(account_id).await?;
        apply(&mut account);
        self.write(account_id, &account).await
    }

    async fn insert(&self, account_id: &AccountId, mut account: Account) -> WalletResult<()> {
        if account.title.is_none() {
            let existing = self
                .storage
                .keys(Namespace::Accounts)
                .await?
                .iter()
                .filter(|key| key.matches_network(account_id.network()))
                .count();
            account.title = Some(default_title(account_id.network(), existing));
        }
        self.write(account_id, &account).await
    }

    async fn load(&self, account_id: &AccountId) -> WalletResult<Option<Account>> {
        Ok(self
            .storage
            .get(&StorageKey::account(Namespace::Accounts, account_id))
            .await?
            .map(|bytes| open_record(&bytes))
            .transpose()?)
    }

    async fn write(&self, account_id: &AccountId, account: &Account) -> WalletResult<()> {
        self.storage
            .set(
                &StorageKey::account(Namespace::Accounts, account_id),
                seal_record(account)?,
            )
            .await?;
        Ok(())
    }

    async fn next_index(&self, network: Network) -> WalletResult<u32> {
        Ok(self
            .storage
            .get(&StorageKey::network(Namespace::AccountCounter, network))
            .await?
            .map(|bytes| open_record::<u32>(&bytes))
            .transpose()?
            .unwrap_or(0))
    }

    async fn write_counter(&self, network: Network, next: u32) -> WalletResult<()> {
        self.storage
            .set(
                &StorageKey::network(Namespace::AccountCounter, network),
                seal_record(&next)?,
            )
            .await?;
        Ok(())
    }

    /// The counter is bumped before the record is written, so a failed write
    /// burns an index instead of risking its reuse.
    async fn allocate_id(&self, network: Network) -> WalletResult<AccountId> {
        let highest_existing = self
            .storage
            .keys(Namespace::Accounts)
            .await?
            .iter()
            .filter_map(StorageKey::account_id)
            .filter(|account_id| account_id.network() == network)
            .map(|account_id| account_id.index() + 1)
            .max()
            .unwrap_or(0);
        let index = self.next_index(network).await?.max(highest_existing);
        self.write_counter(network, index + 1).await?;
        Ok(AccountId::new(index, network))
    }

    async fn set_current(&self, account_id: &AccountId) -> WalletResult<()> {
        let previous = self.current_account_id();
        self.storage
            .set(
                &StorageKey::unscoped(Namespace::CurrentAccountId),
                seal_record(account_id)?,
            )
            .await?;
        if let Some(previous) = previous.filter(|previous| previous != account_id) {
            self.chains.clear_account_cache(&previous);
        }
        self.current.send_replace(Some(account_id.clone()));
        tracing::debug!(%account_id, "account activated");
        Ok(())
    }

    async fn clear_current(&self) -> WalletResult<()> {
        self.current.send_replace(None);
        self.remove_with_retry(&StorageKey::unscoped(Namespace::CurrentAccountId))
            .await?;
        Ok(())
    }

    async fn remove_records(&self, account_id: &AccountId) -> WalletResult<()> {
        for namespace in Namespace::ACCOUNT_SCOPED {
            self.remove_with_retry(&StorageKey::account(namespace, account_id))
                .await?;
        }
        self.chains.clear_account_cache(account_id);
        Ok(())
    }

    async fn remove_with_retry(&self, key: &StorageKey) -> StorageResult<()> {
        (|| async { self.storage.remove(key).await })
            .retry(
                ConstantBuilder::default()
                    .with_delay(REMOVAL_RETRY_DELAY)
                    .with_max_times(REMOVAL_ATTEMPTS),
            )
            .notify(|err, delay| tracing::warn!(%key, %err, ?delay, "retrying removal"))
            .await
    }
}
