//! Tron, the secondary chain. Only reachable through BIP39 mnemonics and
//! view-only addresses.

use async_trait::async_trait;
use bip39::{Language, Mnemonic};
use k256::{elliptic_curve::sec1::ToEncodedPoint, SecretKey};
use rand::{rngs::OsRng, RngCore};
use tiny_hderive::bip32::ExtendedPrivKey;
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

use super::{Chain, ChainCache, ChainError, ChainResult, ChainWallet, WalletRecord};
use crate::{config::Network, vault::SecretPhrase};

const DERIVATION_PATH: &str = "m/44'/195'/0'/0/0";
const ADDRESS_PREFIX: u8 = 0x41;
const ADDRESS_LEN: usize = 21;
const GENERATED_ENTROPY_BYTES: usize = 16;

/// The Tron chain module.
#[derive(Default)]
pub struct TronChain {
    cache: ChainCache,
}

impl TronChain {
    /// Creates the module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Base58Check address for a secp256k1 secret.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidPrivateKey`] if `secret` is not a valid scalar.
    pub fn address_from_secret(secret: &[u8; 32]) -> ChainResult<(String, String)> {
        let secret_key =
            SecretKey::from_slice(secret).map_err(|_| ChainError::InvalidPrivateKey)?;
        let public_key = secret_key.public_key();
        let uncompressed = public_key.to_encoded_point(false);

        let mut hash = [0u8; 32];
        let mut keccak = Keccak::v256();
        keccak.update(&uncompressed.as_bytes()[1..]);
        keccak.finalize(&mut hash);

        let mut payload = Vec::with_capacity(ADDRESS_LEN);
        payload.push(ADDRESS_PREFIX);
        payload.extend_from_slice(&hash[12..]);
        let address = bs58::encode(payload).with_check().into_string();
        let compressed = hex::encode(public_key.to_encoded_point(true).as_bytes());
        Ok((address, compressed))
    }

    fn validate_address(address: &str) -> ChainResult<()> {
        let decoded = bs58::decode(address)
            .with_check(None)
            .into_vec()
            .map_err(|_| ChainError::InvalidAddress(address.to_string()))?;
        if decoded.len() != ADDRESS_LEN || decoded[0] != ADDRESS_PREFIX {
            return Err(ChainError::InvalidAddress(address.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainWallet for TronChain {
    fn chain(&self) -> Chain {
        Chain::Tron
    }

    fn cache(&self) -> &ChainCache {
        &self.cache
    }

    async fn generate_mnemonic(&self) -> ChainResult<SecretPhrase> {
        let mut entropy = Zeroizing::new([0u8; GENERATED_ENTROPY_BYTES]);
        OsRng.fill_bytes(&mut entropy[..]);
        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..])
            .map_err(|err| ChainError::Derivation(err.to_string()))?;
        Ok(SecretPhrase::new(
            mnemonic.words().map(str::to_string).collect(),
        ))
    }

    async fn validate_mnemonic(&self, phrase: &SecretPhrase) -> bool {
        !phrase.is_private_key()
            && Mnemonic::parse_in_normalized(Language::English, &phrase.joined()).is_ok()
    }

    async fn wallet_from_bip39_mnemonic(
        &self,
        _network: Network,
        phrase: &SecretPhrase,
    ) -> ChainResult<WalletRecord> {
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &phrase.joined())
            .map_err(|_| ChainError::InvalidMnemonic)?;
        let seed = Zeroizing::new(mnemonic.to_seed(""));
        let extended = ExtendedPrivKey::derive(&seed[..], DERIVATION_PATH)
            .map_err(|err| ChainError::Derivation(format!("{err:?}")))?;
        let secret = Zeroizing::new(extended.secret());
        let (address, public_key) = Self::address_from_secret(&secret)?;
        Ok(WalletRecord {
            address,
            public_key: Some(public_key),
            index: 0,
            version: None,
        })
    }

    async fn wallet_from_address(
        &self,
        _network: Network,
        address: &str,
    ) -> ChainResult<WalletRecord> {
        Self::validate_address(address)?;
        Ok(WalletRecord::address_only(address.to_string(), 0))
    }

    fn reencode_address(&self, address: &str, _network: Network) -> ChainResult<String> {
        Self::validate_address(address)?;
        Ok(address.to_string())
    }
}
