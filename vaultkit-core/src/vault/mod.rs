//! Credential vault: password-based encryption of mnemonic material, password
//! verification and password rotation.
//!
//! Plaintext only lives inside [`SecretPhrase`] values owned by the caller; the
//! vault itself holds no state besides cost parameters, so every call is
//! independent and reentrant.

mod crypto;
mod secret;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub use crypto::{EncryptedMnemonic, KdfParams};
pub use secret::SecretPhrase;

use crate::{
    accounts::{AccountId, AccountStore},
    error::{WalletError, WalletResult},
};

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors raised by the vault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Encryption was requested with an empty password.
    #[error("password must not be empty")]
    EmptyPassword,
    /// Wrong password or corrupted ciphertext.
    #[error("decryption failed")]
    Crypto,
    /// The blocking worker running the KDF failed.
    #[error("vault task failed: {0}")]
    Task(String),
}

/// Outcome of [`CredentialVault::change_password`].
///
/// Accounts listed in `updated` are already under the new password; accounts in
/// `failed` are untouched and still under whatever password they had.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PasswordChangeReport {
    /// Accounts re-encrypted with the new password.
    pub updated: Vec<AccountId>,
    /// Accounts whose decryption or re-encryption failed.
    pub failed: Vec<AccountId>,
}

impl PasswordChangeReport {
    /// Whether every credential-bearing account moved to the new password.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn copy_password(password: &SecretString) -> SecretString {
    SecretString::from(password.expose_secret().to_string())
}

/// Password-based encryption of mnemonic material.
#[derive(Debug, Clone, Default)]
pub struct CredentialVault {
    kdf: KdfParams,
}

impl CredentialVault {
    /// Creates a vault producing blobs with the given cost parameters.
    #[must_use]
    pub const fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    /// Encrypts `secret` under `password`.
    ///
    /// ```rust
    /// use secrecy::SecretString;
    /// use vaultkit_core::vault::{CredentialVault, KdfParams, SecretPhrase};
    ///
    /// # tokio_test::block_on(async {
    /// let vault = CredentialVault::new(KdfParams::light());
    /// let password = SecretString::from("hunter2".to_string());
    /// let phrase = SecretPhrase::from_phrase("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about");
    /// let blob = vault.encrypt(&phrase, &password).await.unwrap();
    /// let opened = vault.decrypt(&blob, &password).await.unwrap();
    /// assert_eq!(opened.words(), phrase.words());
    /// # });
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EmptyPassword`] for an empty password.
    pub async fn encrypt(
        &self,
        secret: &SecretPhrase,
        password: &SecretString,
    ) -> VaultResult<EncryptedMnemonic> {
        if password.expose_secret().is_empty() {
            return Err(VaultError::EmptyPassword);
        }
        let secret = secret.clone();
        let password = copy_password(password);
        let kdf = self.kdf;
        tokio::task::spawn_blocking(move || crypto::seal(&secret, &password, kdf))
            .await
            .map_err(|err| VaultError::Task(err.to_string()))?
    }

    /// Decrypts `encrypted` with `password`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] for a wrong password or a corrupted blob,
    /// without telling the two apart.
    pub async fn decrypt(
        &self,
        encrypted: &EncryptedMnemonic,
        password: &SecretString,
    ) -> VaultResult<SecretPhrase> {
        let encrypted = encrypted.clone();
        let password = copy_password(password);
        tokio::task::spawn_blocking(move || crypto::open(&encrypted, &password))
            .await
            .map_err(|err| VaultError::Task(err.to_string()))?
    }

    /// Encrypts, then decrypts once and compares against the candidate before the
    /// blob may be persisted.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Debug`] for an empty password or if the round trip
    /// does not reproduce `secret`.
    pub async fn encrypt_verified(
        &self,
        secret: &SecretPhrase,
        password: &SecretString,
    ) -> WalletResult<EncryptedMnemonic> {
        if password.expose_secret().is_empty() {
            return Err(WalletError::debug("refusing to encrypt with an empty password"));
        }
        let encrypted = self
            .encrypt(secret, password)
            .await
            .map_err(|err| WalletError::debug(format!("encryption failed: {err}")))?;
        let decrypted = self
            .decrypt(&encrypted, password)
            .await
            .map_err(|err| WalletError::debug(format!("round trip decryption failed: {err}")))?;
        if !bool::from(decrypted.ct_eq(secret)) {
            return Err(WalletError::debug("round trip did not reproduce the secret"));
        }
        Ok(encrypted)
    }

    /// Checks `password` against the first credential-bearing account.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Server`] when no account holds a credential, or a
    /// storage error if the accounts cannot be read.
    pub async fn verify_password(
        &self,
        accounts: &AccountStore,
        password: &SecretString,
    ) -> WalletResult<bool> {
        let Some((account_id, encrypted)) = accounts.first_encrypted_mnemonic().await? else {
            return Err(WalletError::Server(
                "no credential-bearing account to verify against".to_string(),
            ));
        };
        match self.decrypt(&encrypted, password).await {
            Ok(_) => Ok(true),
            Err(VaultError::Crypto | VaultError::EmptyPassword) => {
                tracing::debug!(%account_id, "password verification failed");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Re-encrypts every credential-bearing account from `old_password` to
    /// `new_password`.
    ///
    /// Each account is updated on its own. A failing account is left untouched and
    /// reported; the batch continues and accounts already moved are not rolled
    /// back, so a wallet may end up under two passwords.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Crypto`] for an empty new password, or a storage
    /// error if the accounts cannot be listed.
    pub async fn change_password(
        &self,
        accounts: &AccountStore,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<PasswordChangeReport> {
        if new_password.expose_secret().is_empty() {
            return Err(WalletError::Crypto);
        }

        let mut report = PasswordChangeReport::default();
        for (account_id, encrypted) in accounts.encrypted_mnemonics().await? {
            let reencrypted = match self.decrypt(&encrypted, old_password).await {
                Ok(secret) => self.encrypt(&secret, new_password).await,
                Err(err) => Err(err),
            };
            let outcome = match reencrypted {
                Ok(encrypted) => accounts
                    .replace_encrypted_mnemonic(&account_id, encrypted)
                    .await
                    .map_err(WalletError::from),
                Err(err) => Err(err.into()),
            };
            match outcome {
                Ok(()) => report.updated.push(account_id),
                Err(err) => {
                    tracing::warn!(%account_id, %err, "password change skipped account");
                    report.failed.push(account_id);
                }
            }
        }

        if !report.is_complete() {
            tracing::warn!(
                updated = report.updated.len(),
                failed = report.failed.len(),
                "password change finished partially"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[tokio::test]
    async fn test_round_trip() {
        let vault = CredentialVault::new(KdfParams::light());
        let secret = SecretPhrase::from_phrase("legal winner thank year wave sausage");
        let encrypted = vault.encrypt(&secret, &password("p")).await.expect("encrypt");
        let decrypted = vault.decrypt(&encrypted, &password("p")).await.expect("decrypt");
        assert_eq!(decrypted.words(), secret.words());
    }

    #[tokio::test]
    async fn test_wrong_password_is_crypto_error() {
        let vault = CredentialVault::new(KdfParams::light());
        let secret = SecretPhrase::from_phrase("legal winner thank year");
        let encrypted = vault.encrypt(&secret, &password("p1")).await.expect("encrypt");
        match vault.decrypt(&encrypted, &password("p2")).await {
            Err(VaultError::Crypto) => {}
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[tokio::test]
    async fn test_empty_password() {
        let vault = CredentialVault::new(KdfParams::light());
        let secret = SecretPhrase::from_phrase("legal winner");
        assert!(matches!(
            vault.encrypt(&secret, &password("")).await,
            Err(VaultError::EmptyPassword)
        ));
        assert!(matches!(
            vault.encrypt_verified(&secret, &password("")).await,
            Err(WalletError::Debug(_))
        ));
    }
}
