use std::{collections::BTreeMap, sync::Arc};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{
    accounts::{Account, AccountId, AccountSecret, AccountStore, HardwareDescriptor},
    chains::{resolve_mnemonic, ton::TonWalletVersion, Chain, WalletRecord},
    config::{Network, WalletConfig},
    error::{WalletError, WalletResult},
    hardware::DiscoveredWallet,
    vault::{CredentialVault, PasswordChangeReport, SecretPhrase},
};

/// The shadow account created on the paired network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondNetworkAccount {
    /// Id on the paired network.
    pub account_id: AccountId,
    /// Address per chain, encoded for the paired network.
    pub address_by_chain: BTreeMap<Chain, String>,
}

/// Outcome of a create or import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedAccount {
    /// The new account.
    pub account_id: AccountId,
    /// Address per chain.
    pub address_by_chain: BTreeMap<Chain, String>,
    /// Present when dual-network mode created a shadow account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_network_account: Option<SecondNetworkAccount>,
}

/// Account creation, import and credential management.
///
/// Every path that persists a secret encrypts it and proves the ciphertext
/// decrypts back before the first write.
pub struct AuthService {
    config: WalletConfig,
    vault: Arc<CredentialVault>,
    accounts: Arc<AccountStore>,
}

impl AuthService {
    /// Creates the service.
    #[must_use]
    pub const fn new(
        config: WalletConfig,
        vault: Arc<CredentialVault>,
        accounts: Arc<AccountStore>,
    ) -> Self {
        Self {
            config,
            vault,
            accounts,
        }
    }

    /// The account store.
    #[must_use]
    pub const fn accounts(&self) -> &Arc<AccountStore> {
        &self.accounts
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Generates a fresh mnemonic, BIP39 when `is_bip39` and enabled, otherwise
    /// in the primary chain's own standard.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] when BIP39 is requested but disabled.
    pub async fn generate_mnemonic(&self, is_bip39: bool) -> WalletResult<SecretPhrase> {
        if is_bip39 && !self.config.is_bip39_mnemonic_enabled {
            return Err(WalletError::invalid_input(
                "is_bip39",
                "BIP39 mnemonics are disabled",
            ));
        }
        let chain = if is_bip39 {
            Chain::SECONDARY
        } else {
            Chain::PRIMARY
        };
        Ok(self.accounts.chains().get(chain).generate_mnemonic().await?)
    }

    /// Whether `phrase` is a private key or validates under an enabled dialect.
    pub async fn validate_mnemonic(&self, phrase: &SecretPhrase) -> bool {
        let chains = self.accounts.chains();
        phrase.is_private_key()
            || chains.get(Chain::PRIMARY).validate_mnemonic(phrase).await
            || (self.config.is_bip39_mnemonic_enabled
                && chains.get(Chain::SECONDARY).validate_mnemonic(phrase).await)
    }

    /// Creates and activates a wallet from a freshly generated mnemonic, at
    /// `version` or the configured default contract version.
    ///
    /// # Errors
    ///
    /// See [`Self::import_mnemonic`].
    pub async fn create_wallet(
        &self,
        network: Network,
        phrase: &SecretPhrase,
        password: &SecretString,
        version: Option<TonWalletVersion>,
    ) -> WalletResult<ImportedAccount> {
        let version = version.unwrap_or(self.config.default_wallet_version);
        self.add_mnemonic_account(network, phrase, password, version)
            .await
    }

    /// Imports and activates a wallet from a mnemonic or private key.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Debug`] for an empty password or a failed
    /// round-trip check, [`WalletError::Crypto`] when `password` does not open
    /// the accounts already stored, [`WalletError::InvalidMnemonic`] when no
    /// dialect validates, or the error of a failed derivation or write. Nothing
    /// is persisted in any of these cases.
    pub async fn import_mnemonic(
        &self,
        network: Network,
        phrase: &SecretPhrase,
        password: &SecretString,
    ) -> WalletResult<ImportedAccount> {
        self.add_mnemonic_account(network, phrase, password, self.config.default_wallet_version)
            .await
    }

    /// Adds the primary-chain wallet of an existing account at another contract
    /// version, as a new account sharing the same secret, and activates it.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] for view-only accounts, accounts
    /// without a known public key, or a version the account already uses, and
    /// [`WalletError::AccountNotFound`] for unknown ids.
    pub async fn import_new_wallet_version(
        &self,
        account_id: &AccountId,
        version: TonWalletVersion,
    ) -> WalletResult<ImportedAccount> {
        let mut account = self.accounts.require_account(account_id).await?;
        if matches!(account.secret, AccountSecret::ViewOnly) {
            return Err(WalletError::invalid_input(
                "account_id",
                format!("{account_id} is view-only"),
            ));
        }
        let current = account.wallets.get(&Chain::PRIMARY).ok_or_else(|| {
            WalletError::invalid_input("account_id", format!("{account_id} has no primary wallet"))
        })?;
        if current.version == Some(version) {
            return Err(WalletError::invalid_input(
                "version",
                format!("{account_id} already uses {version}"),
            ));
        }
        let public_key = current.public_key.as_deref().ok_or_else(|| {
            WalletError::invalid_input("account_id", format!("{account_id} has no public key"))
        })?;

        let network = account_id.network();
        let wallet = self
            .accounts
            .chains()
            .get(Chain::PRIMARY)
            .wallet_from_public_key(network, public_key, version)?;
        account.wallets.insert(Chain::PRIMARY, wallet);
        account.title = None;
        account.is_backup_required = false;

        let address_by_chain = account.addresses();
        let new_account_id = self.accounts.create_account(network, account).await?;
        self.accounts.activate_account(&new_account_id).await?;
        tracing::info!(%account_id, %new_account_id, %version, "wallet version imported");
        Ok(ImportedAccount {
            account_id: new_account_id,
            address_by_chain,
            second_network_account: None,
        })
    }

    /// Imports the selected device wallets, one account each, and activates the
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] for an empty selection, or a storage
    /// error.
    pub async fn import_hardware_wallets(
        &self,
        network: Network,
        wallets: &[DiscoveredWallet],
        descriptor: &HardwareDescriptor,
    ) -> WalletResult<Vec<ImportedAccount>> {
        if wallets.is_empty() {
            return Err(WalletError::invalid_input("wallets", "no wallet selected"));
        }
        let mut imported = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let record = WalletRecord {
                address: wallet.address.clone(),
                public_key: Some(wallet.public_key.clone()),
                index: wallet.index,
                version: Some(wallet.version),
            };
            let account = Account::new(
                AccountSecret::Hardware(descriptor.clone()),
                BTreeMap::from([(Chain::PRIMARY, record)]),
            );
            let address_by_chain = account.addresses();
            let account_id = self.accounts.create_account(network, account).await?;
            imported.push(ImportedAccount {
                account_id,
                address_by_chain,
                second_network_account: None,
            });
        }
        if let Some(first) = imported.first() {
            self.accounts.activate_account(&first.account_id).await?;
        }
        tracing::info!(%network, count = imported.len(), "hardware wallets imported");
        Ok(imported)
    }

    /// Imports a view-only account from one address per chain.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] for no addresses or an address that
    /// does not parse for its chain.
    pub async fn import_view_account(
        &self,
        network: Network,
        addresses: &BTreeMap<Chain, String>,
        title: Option<String>,
    ) -> WalletResult<ImportedAccount> {
        if addresses.is_empty() {
            return Err(WalletError::invalid_input("addresses", "no address given"));
        }
        let mut wallets = BTreeMap::new();
        for (chain, address) in addresses {
            let wallet = self
                .accounts
                .chains()
                .get(*chain)
                .wallet_from_address(network, address)
                .await?;
            wallets.insert(*chain, wallet);
        }
        let mut account = Account::new(AccountSecret::ViewOnly, wallets);
        account.title = title;
        let address_by_chain = account.addresses();
        let account_id = self.accounts.create_account(network, account).await?;
        self.accounts.activate_account(&account_id).await?;
        Ok(ImportedAccount {
            account_id,
            address_by_chain,
            second_network_account: None,
        })
    }

    /// See [`CredentialVault::verify_password`].
    ///
    /// # Errors
    ///
    /// See [`CredentialVault::verify_password`].
    pub async fn verify_password(&self, password: &SecretString) -> WalletResult<bool> {
        self.vault.verify_password(&self.accounts, password).await
    }

    /// See [`CredentialVault::change_password`].
    ///
    /// # Errors
    ///
    /// See [`CredentialVault::change_password`].
    pub async fn change_password(
        &self,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<PasswordChangeReport> {
        self.vault
            .change_password(&self.accounts, old_password, new_password)
            .await
    }

    /// See [`AccountStore::remove_account`].
    ///
    /// # Errors
    ///
    /// See [`AccountStore::remove_account`].
    pub async fn remove_account(
        &self,
        account_id: &AccountId,
        next_account_id: &AccountId,
    ) -> WalletResult<()> {
        self.accounts
            .remove_account(account_id, next_account_id)
            .await
    }

    /// See [`AccountStore::remove_network_accounts`].
    ///
    /// # Errors
    ///
    /// See [`AccountStore::remove_network_accounts`].
    pub async fn remove_network_accounts(&self, network: Network) -> WalletResult<()> {
        self.accounts.remove_network_accounts(network).await
    }

    /// See [`AccountStore::reset_accounts`].
    ///
    /// # Errors
    ///
    /// See [`AccountStore::reset_accounts`].
    pub async fn reset_accounts(&self) -> WalletResult<()> {
        self.accounts.reset_accounts().await
    }

    async fn add_mnemonic_account(
        &self,
        network: Network,
        phrase: &SecretPhrase,
        password: &SecretString,
        version: TonWalletVersion,
    ) -> WalletResult<ImportedAccount> {
        if password.expose_secret().is_empty() {
            return Err(WalletError::debug("empty password at account creation"));
        }
        // Every credential-bearing account shares one password.
        if self.accounts.first_encrypted_mnemonic().await?.is_some()
            && !self.vault.verify_password(&self.accounts, password).await?
        {
            return Err(WalletError::Crypto);
        }

        let resolved = resolve_mnemonic(
            self.accounts.chains(),
            network,
            phrase,
            version,
            self.config.is_bip39_mnemonic_enabled,
        )
        .await?;
        let encrypted = self.vault.encrypt_verified(phrase, password).await?;
        let secret = AccountSecret::Mnemonic {
            encrypted,
            dialect: resolved.dialect,
        };

        let account = Account::new(secret.clone(), resolved.wallets);
        let address_by_chain = account.addresses();
        let shadow_wallets = if self.config.is_core_wallet {
            Some(self.reencode_wallets(&account.wallets, network.other())?)
        } else {
            None
        };

        let account_id = self.accounts.create_account(network, account).await?;
        let second_network_account = match shadow_wallets {
            Some(wallets) => match self.add_shadow_account(&account_id, secret, wallets).await {
                Ok(shadow) => Some(shadow),
                Err(err) => {
                    self.discard(&account_id).await;
                    return Err(err);
                }
            },
            None => None,
        };
        if let Err(err) = self.accounts.activate_account(&account_id).await {
            self.discard(&account_id).await;
            if let Some(shadow) = &second_network_account {
                self.discard(&shadow.account_id).await;
            }
            return Err(err);
        }
        tracing::info!(%account_id, dialect = ?resolved.dialect, "mnemonic account added");

        Ok(ImportedAccount {
            account_id,
            address_by_chain,
            second_network_account,
        })
    }

    /// Rolls back an account written by a create that then failed.
    async fn discard(&self, account_id: &AccountId) {
        match self.accounts.discard_account(account_id).await {
            Ok(()) => tracing::warn!(%account_id, "rolled back partially created account"),
            Err(err) => tracing::error!(%account_id, %err, "could not roll back account"),
        }
    }

    fn reencode_wallets(
        &self,
        wallets: &BTreeMap<Chain, WalletRecord>,
        network: Network,
    ) -> WalletResult<BTreeMap<Chain, WalletRecord>> {
        wallets
            .iter()
            .map(|(chain, wallet)| {
                let address = self
                    .accounts
                    .chains()
                    .get(*chain)
                    .reencode_address(&wallet.address, network)?;
                Ok((
                    *chain,
                    WalletRecord {
                        address,
                        ..wallet.clone()
                    },
                ))
            })
            .collect()
    }

    /// Mirrors the primary index on the paired network, or takes a fresh id there
    /// when that index is taken.
    async fn add_shadow_account(
        &self,
        primary_id: &AccountId,
        secret: AccountSecret,
        wallets: BTreeMap<Chain, WalletRecord>,
    ) -> WalletResult<SecondNetworkAccount> {
        let network = primary_id.network().other();
        let account = Account::new(secret, wallets);
        let address_by_chain = account.addresses();
        let mirrored = primary_id.on_network(network);
        let account_id = match self
            .accounts
            .create_account_with_id(&mirrored, account.clone())
            .await
        {
            Ok(()) => mirrored,
            Err(WalletError::InvalidInput { .. }) => {
                tracing::debug!(%mirrored, "mirrored id taken, allocating a fresh one");
                self.accounts.create_account(network, account).await?
            }
            Err(err) => return Err(err),
        };
        Ok(SecondNetworkAccount {
            account_id,
            address_by_chain,
        })
    }
}
