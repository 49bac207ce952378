mod common;

use std::collections::BTreeMap;

use common::{harness, password, BIP39_PHRASE, PASSWORD};
use vaultkit_core::{
    accounts::{Account, AccountSecret},
    chains::{ton::TonWalletVersion, Chain, MnemonicDialect},
    config::Network,
    vault::{CredentialVault, KdfParams, SecretPhrase, VaultError},
    WalletError,
};

#[tokio::test]
async fn test_round_trip_for_mnemonic_and_private_key() {
    let vault = CredentialVault::new(KdfParams::light());
    let secrets = [
        SecretPhrase::from_phrase(BIP39_PHRASE),
        SecretPhrase::from_phrase(&"ab".repeat(32)),
    ];
    for secret in secrets {
        let encrypted = vault
            .encrypt(&secret, &password(PASSWORD))
            .await
            .expect("encrypt");
        let decrypted = vault
            .decrypt(&encrypted, &password(PASSWORD))
            .await
            .expect("decrypt");
        assert_eq!(decrypted.words(), secret.words());
    }
}

#[tokio::test]
async fn test_other_password_is_crypto_error() {
    let vault = CredentialVault::new(KdfParams::light());
    let secret = SecretPhrase::from_phrase(BIP39_PHRASE);
    let encrypted = vault
        .encrypt(&secret, &password("first"))
        .await
        .expect("encrypt");

    for wrong in ["second", "First", "first "] {
        match vault.decrypt(&encrypted, &password(wrong)).await {
            Err(VaultError::Crypto) => {}
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }
}

#[tokio::test]
async fn test_verify_password_against_stored_account() {
    let harness = harness().await;
    harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .expect("import");

    assert!(harness.auth.verify_password(&password(PASSWORD)).await.unwrap());
    assert!(!harness.auth.verify_password(&password("nope")).await.unwrap());
}

#[tokio::test]
async fn test_verify_password_without_accounts_is_server_error() {
    let harness = harness().await;
    match harness.auth.verify_password(&password(PASSWORD)).await {
        Err(WalletError::Server(_)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test]
async fn test_change_password_reports_partial_failure() {
    let harness = harness().await;
    let first = harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .expect("import first");
    // Stored by a client that did not check the existing password.
    let phrase = common::native_only_phrase();
    let encrypted = harness
        .vault
        .encrypt(&phrase, &password("another-password"))
        .await
        .expect("encrypt");
    let wallet = harness
        .accounts
        .chains()
        .get(Chain::Ton)
        .wallet_from_mnemonic(Network::Mainnet, &phrase, TonWalletVersion::default())
        .await
        .expect("derive");
    let second_id = harness
        .accounts
        .create_account(
            Network::Mainnet,
            Account::new(
                AccountSecret::Mnemonic {
                    encrypted,
                    dialect: MnemonicDialect::ChainNative,
                },
                BTreeMap::from([(Chain::Ton, wallet)]),
            ),
        )
        .await
        .expect("store second");
    let untouched = harness
        .accounts
        .require_account(&second_id)
        .await
        .unwrap();

    let report = harness
        .auth
        .change_password(&password(PASSWORD), &password("new-password"))
        .await
        .expect("change password");

    assert!(!report.is_complete());
    assert_eq!(report.updated, vec![first.account_id.clone()]);
    assert_eq!(report.failed, vec![second_id.clone()]);

    // The failing account keeps its ciphertext, the moved one opens with the new password.
    let after = harness
        .accounts
        .require_account(&second_id)
        .await
        .unwrap();
    assert_eq!(after.encrypted_mnemonic(), untouched.encrypted_mnemonic());

    let moved = harness
        .accounts
        .require_account(&first.account_id)
        .await
        .unwrap();
    let encrypted = moved.encrypted_mnemonic().expect("seed account");
    let decrypted = harness
        .vault
        .decrypt(encrypted, &password("new-password"))
        .await
        .expect("new password opens");
    assert_eq!(decrypted.joined().as_str(), BIP39_PHRASE);
}

#[tokio::test]
async fn test_change_password_rejects_empty_new_password() {
    let harness = harness().await;
    match harness
        .auth
        .change_password(&password(PASSWORD), &password(""))
        .await
    {
        Err(WalletError::Crypto) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
}
