//! Mnemonic dialect resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ton::TonWalletVersion, Chain, ChainRegistry, WalletRecord};
use crate::{
    config::Network,
    error::{WalletError, WalletResult},
    vault::SecretPhrase,
};

/// How a secret was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MnemonicDialect {
    /// A single hex-encoded private key.
    PrivateKey,
    /// The primary chain's own mnemonic standard.
    ChainNative,
    /// BIP39. One seed feeds every supported chain.
    Bip39,
}

/// The wallets derived from one secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWallets {
    /// The interpretation that produced the wallets.
    pub dialect: MnemonicDialect,
    /// One wallet per derived chain.
    pub wallets: BTreeMap<Chain, WalletRecord>,
}

/// Classifies `secret` and derives its wallets.
///
/// A phrase valid under both dialects whose chain-native wallet already has
/// on-chain history stays chain-native. Otherwise a valid BIP39 phrase (when
/// enabled) yields a wallet on every chain, and anything else only the primary
/// chain's wallet.
///
/// # Errors
///
/// Returns [`WalletError::InvalidMnemonic`] if no dialect validates, or the
/// chain error of a failed derivation or history probe.
pub async fn resolve_mnemonic(
    chains: &ChainRegistry,
    network: Network,
    secret: &SecretPhrase,
    version: TonWalletVersion,
    is_bip39_enabled: bool,
) -> WalletResult<ResolvedWallets> {
    let primary = chains.get(Chain::PRIMARY);
    let secondary = chains.get(Chain::SECONDARY);

    let is_private_key = secret.is_private_key();
    let is_bip39 =
        is_bip39_enabled && !is_private_key && secondary.validate_mnemonic(secret).await;
    let is_native = !is_private_key && primary.validate_mnemonic(secret).await;

    if !is_private_key && !is_bip39 && !is_native {
        return Err(WalletError::InvalidMnemonic);
    }

    let mut native_wallet = None;
    let mut use_bip39 = is_bip39;
    if is_bip39 && is_native {
        let wallet = primary.wallet_from_mnemonic(network, secret, version).await?;
        if primary
            .last_transaction_id(network, &wallet.address)
            .await?
            .is_some()
        {
            tracing::info!(%network, "ambiguous mnemonic has native history, keeping native wallet");
            use_bip39 = false;
        }
        native_wallet = Some(wallet);
    }

    let mut wallets = BTreeMap::new();
    let dialect = if use_bip39 {
        for chain in chains.iter() {
            wallets.insert(
                chain.chain(),
                chain.wallet_from_bip39_mnemonic(network, secret).await?,
            );
        }
        MnemonicDialect::Bip39
    } else if is_private_key {
        wallets.insert(
            Chain::PRIMARY,
            primary.wallet_from_private_key(network, secret, version).await?,
        );
        MnemonicDialect::PrivateKey
    } else {
        let wallet = match native_wallet {
            Some(wallet) => wallet,
            None => primary.wallet_from_mnemonic(network, secret, version).await?,
        };
        wallets.insert(Chain::PRIMARY, wallet);
        MnemonicDialect::ChainNative
    };

    Ok(ResolvedWallets { dialect, wallets })
}
