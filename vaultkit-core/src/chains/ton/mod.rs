//! TON, the primary chain.

pub mod address;
pub mod mnemonic;

use std::sync::Arc;

use async_trait::async_trait;
use bip39::{Language, Mnemonic};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use zeroize::Zeroizing;

pub use address::TonAddress;

use super::{
    slip10, Chain, ChainCache, ChainError, ChainResult, ChainStateProbe, ChainWallet,
    WalletRecord,
};
use crate::{config::Network, vault::SecretPhrase};

const BIP39_DERIVATION_PATH: &str = "m/44'/607'/0'";

/// Wallet contract versions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum TonWalletVersion {
    /// Wallet v3 revision 2.
    #[strum(serialize = "v3R2")]
    #[serde(rename = "v3R2")]
    V3R2,
    /// Wallet v4 revision 2.
    #[default]
    #[strum(serialize = "v4R2")]
    #[serde(rename = "v4R2")]
    V4R2,
    /// Wallet v5.
    #[strum(serialize = "W5")]
    #[serde(rename = "W5")]
    W5,
}

/// The TON chain module.
pub struct TonChain {
    cache: ChainCache,
    probe: Arc<dyn ChainStateProbe>,
}

impl TonChain {
    /// Creates the module; `probe` answers transaction-history queries.
    #[must_use]
    pub fn new(probe: Arc<dyn ChainStateProbe>) -> Self {
        Self {
            cache: ChainCache::default(),
            probe,
        }
    }

    fn record(
        signing_key: &SigningKey,
        network: Network,
        version: TonWalletVersion,
    ) -> WalletRecord {
        Self::record_for_key(signing_key.verifying_key().to_bytes(), network, version)
    }

    fn record_for_key(
        public_key: [u8; 32],
        network: Network,
        version: TonWalletVersion,
    ) -> WalletRecord {
        WalletRecord {
            address: TonAddress::for_wallet(&public_key, version).to_friendly(network),
            public_key: Some(hex::encode(public_key)),
            index: 0,
            version: Some(version),
        }
    }
}

async fn blocking<T, F>(task: F) -> ChainResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ChainResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ChainError::Derivation(format!("derivation task failed: {err}")))?
}

#[async_trait]
impl ChainWallet for TonChain {
    fn chain(&self) -> Chain {
        Chain::Ton
    }

    fn cache(&self) -> &ChainCache {
        &self.cache
    }

    async fn generate_mnemonic(&self) -> ChainResult<SecretPhrase> {
        blocking(mnemonic::generate).await
    }

    async fn validate_mnemonic(&self, phrase: &SecretPhrase) -> bool {
        let phrase = phrase.clone();
        blocking(move || Ok(mnemonic::validate(&phrase)))
            .await
            .unwrap_or(false)
    }

    async fn wallet_from_mnemonic(
        &self,
        network: Network,
        phrase: &SecretPhrase,
        version: TonWalletVersion,
    ) -> ChainResult<WalletRecord> {
        let phrase = phrase.clone();
        let signing_key = blocking(move || mnemonic::signing_key(&phrase)).await?;
        Ok(Self::record(&signing_key, network, version))
    }

    async fn wallet_from_bip39_mnemonic(
        &self,
        network: Network,
        phrase: &SecretPhrase,
    ) -> ChainResult<WalletRecord> {
        let joined = phrase.joined();
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &joined)
            .map_err(|_| ChainError::InvalidMnemonic)?;
        let seed = Zeroizing::new(mnemonic.to_seed(""));
        let secret = slip10::derive_ed25519(&seed[..], BIP39_DERIVATION_PATH)?;
        let signing_key = SigningKey::from_bytes(&secret);
        Ok(Self::record(&signing_key, network, TonWalletVersion::default()))
    }

    async fn wallet_from_private_key(
        &self,
        network: Network,
        private_key: &SecretPhrase,
        version: TonWalletVersion,
    ) -> ChainResult<WalletRecord> {
        if !private_key.is_private_key() {
            return Err(ChainError::InvalidPrivateKey);
        }
        let joined = private_key.joined();
        let mut secret = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(joined.as_str(), &mut secret[..])
            .map_err(|_| ChainError::InvalidPrivateKey)?;
        let signing_key = SigningKey::from_bytes(&secret);
        Ok(Self::record(&signing_key, network, version))
    }

    async fn wallet_from_address(
        &self,
        network: Network,
        address: &str,
    ) -> ChainResult<WalletRecord> {
        let parsed = TonAddress::parse(address)?;
        Ok(WalletRecord::address_only(parsed.to_friendly(network), 0))
    }

    fn wallet_from_public_key(
        &self,
        network: Network,
        public_key: &str,
        version: TonWalletVersion,
    ) -> ChainResult<WalletRecord> {
        let mut key = [0u8; 32];
        hex::decode_to_slice(public_key, &mut key)
            .map_err(|_| ChainError::Derivation("malformed public key".to_string()))?;
        Ok(Self::record_for_key(key, network, version))
    }

    fn reencode_address(&self, address: &str, network: Network) -> ChainResult<String> {
        Ok(TonAddress::parse(address)?.to_friendly(network))
    }

    async fn last_transaction_id(
        &self,
        network: Network,
        address: &str,
    ) -> ChainResult<Option<String>> {
        self.probe.last_transaction_id(network, address).await
    }
}
