//! Chain key derivation.
//!
//! Every supported chain implements the [`ChainWallet`] capability set and is
//! registered in the fixed-size [`ChainRegistry`]. The rest of the crate only
//! talks to chains through that interface.

pub mod cache;
pub mod probe;
pub mod resolve;
mod slip10;
pub mod ton;
pub mod tron;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

pub use cache::ChainCache;
pub use probe::{ChainStateProbe, MemoryProbe, NoHistoryProbe, TonCenterProbe};
pub use resolve::{resolve_mnemonic, MnemonicDialect, ResolvedWallets};
use ton::{TonChain, TonWalletVersion};
use tron::TronChain;

use crate::{accounts::AccountId, config::Network, vault::SecretPhrase};

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors raised by chain modules.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The words are not a valid mnemonic for this chain.
    #[error("invalid mnemonic")]
    InvalidMnemonic,
    /// The private key is malformed.
    #[error("invalid private key")]
    InvalidPrivateKey,
    /// The address does not parse for this chain.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// The chain does not offer this capability.
    #[error("{chain} does not support {operation}")]
    Unsupported {
        /// The chain asked.
        chain: Chain,
        /// The capability requested.
        operation: &'static str,
    },
    /// Key derivation failed.
    #[error("derivation failed: {0}")]
    Derivation(String),
    /// Chain state could not be fetched.
    #[error("network error at {url}: {error}")]
    Network {
        /// The requested url.
        url: String,
        /// HTTP status, if a response arrived.
        status: Option<u16>,
        /// Failure detail.
        error: String,
    },
}

impl ChainError {
    const fn unsupported(chain: Chain, operation: &'static str) -> Self {
        Self::Unsupported { chain, operation }
    }
}

/// The supported chains.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Chain {
    /// Primary chain, with its own mnemonic standard.
    Ton,
    /// Secondary chain, derived from BIP39 mnemonics only.
    Tron,
}

impl Chain {
    /// Every supported chain, primary first.
    pub const ALL: [Self; 2] = [Self::Ton, Self::Tron];
    /// The chain every seed-derived account has a wallet on.
    pub const PRIMARY: Self = Self::Ton;
    /// The chain derived from industry-standard mnemonics.
    pub const SECONDARY: Self = Self::Tron;
}

/// One chain's wallet inside an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    /// Network-bound address.
    pub address: String,
    /// Hex public key, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Derivation index.
    pub index: u32,
    /// Wallet contract version, for chains that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<TonWalletVersion>,
}

impl WalletRecord {
    /// A record that only carries an address.
    #[must_use]
    pub const fn address_only(address: String, index: u32) -> Self {
        Self {
            address,
            public_key: None,
            index,
            version: None,
        }
    }
}

/// The capability set every chain module offers.
///
/// Capabilities a chain lacks return [`ChainError::Unsupported`].
#[async_trait]
pub trait ChainWallet: Send + Sync {
    /// Which chain this is.
    fn chain(&self) -> Chain;

    /// Per-account balance and activity cache.
    fn cache(&self) -> &ChainCache;

    /// Generates a new mnemonic in this chain's standard.
    ///
    /// # Errors
    ///
    /// Returns an error if unsupported or derivation fails.
    async fn generate_mnemonic(&self) -> ChainResult<SecretPhrase> {
        Err(ChainError::unsupported(self.chain(), "generate_mnemonic"))
    }

    /// Whether `mnemonic` is valid under this chain's standard.
    async fn validate_mnemonic(&self, _mnemonic: &SecretPhrase) -> bool {
        false
    }

    /// Derives the wallet for a chain-native mnemonic.
    ///
    /// # Errors
    ///
    /// Returns an error if unsupported or the words do not validate.
    async fn wallet_from_mnemonic(
        &self,
        _network: Network,
        _mnemonic: &SecretPhrase,
        _version: TonWalletVersion,
    ) -> ChainResult<WalletRecord> {
        Err(ChainError::unsupported(self.chain(), "wallet_from_mnemonic"))
    }

    /// Derives the wallet for a BIP39 mnemonic.
    ///
    /// # Errors
    ///
    /// Returns an error if unsupported or the words do not validate.
    async fn wallet_from_bip39_mnemonic(
        &self,
        _network: Network,
        _mnemonic: &SecretPhrase,
    ) -> ChainResult<WalletRecord> {
        Err(ChainError::unsupported(self.chain(), "wallet_from_bip39_mnemonic"))
    }

    /// Derives the wallet for a raw private key.
    ///
    /// # Errors
    ///
    /// Returns an error if unsupported or the key is malformed.
    async fn wallet_from_private_key(
        &self,
        _network: Network,
        _private_key: &SecretPhrase,
        _version: TonWalletVersion,
    ) -> ChainResult<WalletRecord> {
        Err(ChainError::unsupported(self.chain(), "wallet_from_private_key"))
    }

    /// Builds the wallet of a known hex public key at another contract `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if unsupported or the key is malformed.
    fn wallet_from_public_key(
        &self,
        _network: Network,
        _public_key: &str,
        _version: TonWalletVersion,
    ) -> ChainResult<WalletRecord> {
        Err(ChainError::unsupported(self.chain(), "wallet_from_public_key"))
    }

    /// Builds a view-only wallet from an address.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidAddress`] if the address does not parse.
    async fn wallet_from_address(
        &self,
        _network: Network,
        _address: &str,
    ) -> ChainResult<WalletRecord> {
        Err(ChainError::unsupported(self.chain(), "wallet_from_address"))
    }

    /// Re-encodes `address` for `network`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidAddress`] if the address does not parse.
    fn reencode_address(&self, address: &str, _network: Network) -> ChainResult<String> {
        Ok(address.to_string())
    }

    /// Identifier of the latest transaction at `address`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if chain state cannot be fetched.
    async fn last_transaction_id(
        &self,
        _network: Network,
        _address: &str,
    ) -> ChainResult<Option<String>> {
        Ok(None)
    }

    /// Drops cached state of one account.
    fn clear_account_cache(&self, account_id: &AccountId) {
        self.cache().clear_account(account_id);
    }

    /// Drops cached state of every account on `network`.
    fn clear_accounts_cache_by_network(&self, network: Network) {
        self.cache().clear_network(network);
    }

    /// Drops all cached state.
    fn clear_accounts_cache(&self) {
        self.cache().clear();
    }
}

/// Fixed registry holding exactly one module per [`Chain`].
#[derive(Clone)]
pub struct ChainRegistry {
    ton: Arc<dyn ChainWallet>,
    tron: Arc<dyn ChainWallet>,
}

impl ChainRegistry {
    /// Builds a registry from explicit modules.
    #[must_use]
    pub fn new(ton: Arc<dyn ChainWallet>, tron: Arc<dyn ChainWallet>) -> Self {
        Self { ton, tron }
    }

    /// The bundled chain modules, with `probe` answering history queries.
    #[must_use]
    pub fn standard(probe: Arc<dyn ChainStateProbe>) -> Self {
        Self::new(Arc::new(TonChain::new(probe)), Arc::new(TronChain::new()))
    }

    /// The module for `chain`.
    #[must_use]
    pub fn get(&self, chain: Chain) -> &dyn ChainWallet {
        match chain {
            Chain::Ton => self.ton.as_ref(),
            Chain::Tron => self.tron.as_ref(),
        }
    }

    /// Every module, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ChainWallet> {
        Chain::ALL.into_iter().map(|chain| self.get(chain))
    }

    /// Clears one account's caches on every chain.
    pub fn clear_account_cache(&self, account_id: &AccountId) {
        for chain in self.iter() {
            chain.clear_account_cache(account_id);
        }
    }

    /// Clears every account's caches on `network`, on every chain.
    pub fn clear_accounts_cache_by_network(&self, network: Network) {
        for chain in self.iter() {
            chain.clear_accounts_cache_by_network(network);
        }
    }

    /// Clears all caches on every chain.
    pub fn clear_accounts_cache(&self) {
        for chain in self.iter() {
            chain.clear_accounts_cache();
        }
    }
}

impl fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|chain| chain.chain()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_holds_one_module_per_chain() {
        let registry = ChainRegistry::standard(Arc::new(NoHistoryProbe));
        for chain in Chain::ALL {
            assert_eq!(registry.get(chain).chain(), chain);
        }
        assert_eq!(format!("{registry:?}"), "[Ton, Tron]");
    }

    #[tokio::test]
    async fn test_unsupported_capability() {
        let tron = TronChain::new();
        match tron
            .wallet_from_private_key(
                Network::Mainnet,
                &SecretPhrase::from_phrase(&"11".repeat(32)),
                TonWalletVersion::default(),
            )
            .await
        {
            Err(ChainError::Unsupported { chain, .. }) => assert_eq!(chain, Chain::Tron),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }
}
