use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    chains::{Chain, MnemonicDialect, WalletRecord},
    config::Network,
    vault::EncryptedMnemonic,
};

/// What an account can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountKind {
    /// Holds an encrypted mnemonic or key.
    SeedDerived,
    /// Signing is delegated to an external device.
    Hardware,
    /// Addresses only.
    ViewOnly,
}

/// Device details stored with a hardware account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareDescriptor {
    /// Transport driver used at pairing time.
    pub driver: String,
    /// Device identifier reported by the transport.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Human readable device name.
    #[serde(default)]
    pub device_name: Option<String>,
    /// Signing app version.
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Secret material, or the absence of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AccountSecret {
    /// A password-encrypted mnemonic or private key.
    Mnemonic {
        /// The ciphertext.
        encrypted: EncryptedMnemonic,
        /// How the plaintext was interpreted.
        dialect: MnemonicDialect,
    },
    /// Keys live on a hardware device.
    Hardware(HardwareDescriptor),
    /// No keys at all.
    ViewOnly,
}

/// A stored account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// User-facing label.
    pub title: Option<String>,
    /// Secret material.
    pub secret: AccountSecret,
    /// One wallet per chain.
    pub wallets: BTreeMap<Chain, WalletRecord>,
    /// The user skipped the backup check.
    #[serde(default)]
    pub is_backup_required: bool,
}

impl Account {
    /// Creates an untitled account.
    #[must_use]
    pub const fn new(secret: AccountSecret, wallets: BTreeMap<Chain, WalletRecord>) -> Self {
        Self {
            title: None,
            secret,
            wallets,
            is_backup_required: false,
        }
    }

    /// See [`AccountKind`].
    #[must_use]
    pub const fn kind(&self) -> AccountKind {
        match self.secret {
            AccountSecret::Mnemonic { .. } => AccountKind::SeedDerived,
            AccountSecret::Hardware(_) => AccountKind::Hardware,
            AccountSecret::ViewOnly => AccountKind::ViewOnly,
        }
    }

    /// The encrypted mnemonic, for seed-derived accounts.
    #[must_use]
    pub const fn encrypted_mnemonic(&self) -> Option<&EncryptedMnemonic> {
        match &self.secret {
            AccountSecret::Mnemonic { encrypted, .. } => Some(encrypted),
            _ => None,
        }
    }

    /// Address per chain.
    #[must_use]
    pub fn addresses(&self) -> BTreeMap<Chain, String> {
        self.wallets
            .iter()
            .map(|(chain, wallet)| (*chain, wallet.address.clone()))
            .collect()
    }
}

/// `"Wallet 3"` on mainnet, `"Testnet Wallet 3"` on testnet.
#[must_use]
pub fn default_title(network: Network, existing_on_network: usize) -> String {
    let n = existing_on_network + 1;
    match network {
        Network::Mainnet => format!("Wallet {n}"),
        Network::Testnet => format!("Testnet Wallet {n}"),
    }
}
