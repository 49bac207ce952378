mod common;

use std::collections::BTreeMap;

use common::{
    flaky_harness, harness, harness_with, password, test_config, BIP39_PHRASE, PASSWORD,
};
use vaultkit_core::{
    accounts::{AccountKind, AccountSecret},
    auth::{AuthFlow, AuthState},
    chains::{ton::TonWalletVersion, Chain, MnemonicDialect},
    config::{Network, RuntimeEnvironment, WalletConfig},
    storage::{KeyValueStore, Namespace},
    vault::SecretPhrase,
    AccountId, WalletError,
};

const TRON_ADDRESS: &str = "TUEZSdKsoDHQMeZwihtdoBiN46zxhGWYdH";

fn core_config() -> WalletConfig {
    WalletConfig {
        is_core_wallet: true,
        ..test_config()
    }
}

#[tokio::test]
async fn test_native_mnemonic_creates_single_chain_account() {
    let harness = harness().await;
    let phrase = common::native_only_phrase();

    let created = harness
        .auth
        .create_wallet(Network::Testnet, &phrase, &password(PASSWORD), None)
        .await
        .expect("create wallet");

    assert_eq!(created.account_id.network(), Network::Testnet);
    let addresses = harness
        .accounts
        .get_addresses_from_account(&created.account_id)
        .await
        .unwrap();
    assert_eq!(addresses.len(), 1);
    assert!(!addresses[&Chain::Ton].is_empty());
    assert_eq!(
        harness.accounts.current_account_id(),
        Some(created.account_id.clone())
    );

    let account = harness
        .accounts
        .require_account(&created.account_id)
        .await
        .unwrap();
    assert_eq!(account.kind(), AccountKind::SeedDerived);
    assert_eq!(account.title.as_deref(), Some("Testnet Wallet 1"));
}

#[tokio::test]
async fn test_empty_password_is_rejected_before_any_write() {
    let harness = harness().await;
    let phrase = common::native_only_phrase();

    match harness
        .auth
        .import_mnemonic(Network::Mainnet, &phrase, &password(""))
        .await
    {
        Err(WalletError::Debug(_)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
    assert!(harness.storage.is_empty().unwrap());
    assert!(harness.accounts.list_accounts(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_mnemonic() {
    let harness = harness().await;
    let phrase = SecretPhrase::from_phrase("these words are not a wallet at all");
    assert!(!harness.auth.validate_mnemonic(&phrase).await);
    match harness
        .auth
        .import_mnemonic(Network::Mainnet, &phrase, &password(PASSWORD))
        .await
    {
        Err(WalletError::InvalidMnemonic) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test]
async fn test_fresh_bip39_mnemonic_derives_both_chains_from_one_ciphertext() {
    let harness = harness().await;
    let imported = harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .expect("import");

    assert_eq!(
        imported.address_by_chain.keys().copied().collect::<Vec<_>>(),
        vec![Chain::Ton, Chain::Tron]
    );
    assert!(imported.address_by_chain[&Chain::Tron].starts_with('T'));

    let account = harness
        .accounts
        .require_account(&imported.account_id)
        .await
        .unwrap();
    match &account.secret {
        AccountSecret::Mnemonic { dialect, .. } => assert_eq!(*dialect, MnemonicDialect::Bip39),
        other => panic!("unexpected secret: {other:?}"),
    }
}

#[tokio::test]
async fn test_bip39_disabled_rejects_bip39_only_phrase() {
    let harness = harness_with(WalletConfig {
        is_bip39_mnemonic_enabled: false,
        ..test_config()
    })
    .await;
    let phrase = SecretPhrase::from_phrase(BIP39_PHRASE);
    assert!(!harness.auth.validate_mnemonic(&phrase).await);
    assert!(harness.auth.generate_mnemonic(true).await.is_err());
}

#[tokio::test]
async fn test_ambiguous_mnemonic_with_native_history_stays_native() {
    let harness = harness().await;
    let phrase = common::ambiguous_phrase();
    let native = harness
        .accounts
        .chains()
        .get(Chain::Ton)
        .wallet_from_mnemonic(Network::Mainnet, &phrase, Default::default())
        .await
        .expect("native wallet");
    harness
        .probe
        .record(Network::Mainnet, &native.address, "47000001:abcd");

    let imported = harness
        .auth
        .import_mnemonic(Network::Mainnet, &phrase, &password(PASSWORD))
        .await
        .expect("import");

    assert_eq!(imported.address_by_chain.len(), 1);
    assert_eq!(imported.address_by_chain[&Chain::Ton], native.address);
}

#[tokio::test]
async fn test_ambiguous_mnemonic_without_history_is_bip39() {
    let harness = harness().await;
    let phrase = common::ambiguous_phrase();

    let imported = harness
        .auth
        .import_mnemonic(Network::Mainnet, &phrase, &password(PASSWORD))
        .await
        .expect("import");

    assert_eq!(imported.address_by_chain.len(), 2);
}

#[tokio::test]
async fn test_core_mode_adds_shadow_account_on_paired_network() {
    let harness = harness_with(WalletConfig {
        is_core_wallet: true,
        ..test_config()
    })
    .await;

    let imported = harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .expect("import");

    let shadow = imported.second_network_account.expect("shadow account");
    assert_eq!(shadow.account_id, AccountId::new(0, Network::Testnet));
    assert_ne!(
        shadow.address_by_chain[&Chain::Ton],
        imported.address_by_chain[&Chain::Ton]
    );
    assert_eq!(
        shadow.address_by_chain[&Chain::Tron],
        imported.address_by_chain[&Chain::Tron]
    );

    let primary = harness
        .accounts
        .require_account(&imported.account_id)
        .await
        .unwrap();
    let mirrored = harness
        .accounts
        .require_account(&shadow.account_id)
        .await
        .unwrap();
    assert_eq!(primary.encrypted_mnemonic(), mirrored.encrypted_mnemonic());
}

#[tokio::test]
async fn test_view_only_import() {
    let harness = harness().await;
    let source = harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .unwrap();

    let view = harness
        .auth
        .import_view_account(
            Network::Mainnet,
            &source.address_by_chain,
            Some("Watched".to_string()),
        )
        .await
        .expect("view import");
    let account = harness
        .accounts
        .require_account(&view.account_id)
        .await
        .unwrap();
    assert_eq!(account.kind(), AccountKind::ViewOnly);
    assert_eq!(account.title.as_deref(), Some("Watched"));
    assert_eq!(account.addresses(), source.address_by_chain);

    let bogus = BTreeMap::from([(Chain::Tron, "not-an-address".to_string())]);
    match harness
        .auth
        .import_view_account(Network::Mainnet, &bogus, None)
        .await
    {
        Err(WalletError::InvalidInput { .. }) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test]
async fn test_create_flow_with_backup_check() {
    let harness = harness_with(WalletConfig {
        is_bip39_mnemonic_enabled: false,
        ..test_config()
    })
    .await;
    let mut flow = AuthFlow::new(harness.auth.clone(), RuntimeEnvironment::default());

    let words = flow
        .start_creating_wallet(Network::Mainnet)
        .await
        .expect("start")
        .words()
        .to_vec();
    assert_eq!(words.len(), 24);
    assert_eq!(flow.state(), AuthState::CreatingWallet);

    flow.confirm_mnemonic_shown().unwrap();
    assert_eq!(flow.state(), AuthState::CreatePassword);

    let created = flow
        .submit_password(password(PASSWORD))
        .await
        .expect("create");
    assert_eq!(flow.state(), AuthState::DisclaimerAndBackup);

    let indexes = flow.mnemonic_check_indexes().to_vec();
    assert_eq!(indexes.len(), 3);
    let wrong: Vec<String> = indexes.iter().map(|_| "zoo".to_string()).collect();
    let right: Vec<String> = indexes.iter().map(|index| words[*index].clone()).collect();
    if wrong != right {
        assert!(!flow.check_mnemonic(&wrong).unwrap());
        assert_eq!(flow.state(), AuthState::DisclaimerAndBackup);
    }
    assert!(flow.check_mnemonic(&right).unwrap());
    assert_eq!(flow.state(), AuthState::Ready);
    assert!(flow.session().unwrap().mnemonic.is_none());

    assert_eq!(flow.finish(), Some(created.account_id));
    assert_eq!(flow.state(), AuthState::None);
}

#[tokio::test]
async fn test_skipping_backup_flags_account() {
    let harness = harness().await;
    let mut flow = AuthFlow::new(harness.auth.clone(), RuntimeEnvironment::default());
    flow.start_creating_wallet(Network::Mainnet).await.unwrap();
    flow.confirm_mnemonic_shown().unwrap();
    let created = flow.submit_password(password(PASSWORD)).await.unwrap();

    flow.skip_backup().await.expect("skip");
    assert_eq!(flow.state(), AuthState::Ready);
    let account = harness
        .accounts
        .require_account(&created.account_id)
        .await
        .unwrap();
    assert!(account.is_backup_required);
}

#[tokio::test]
async fn test_import_flow_stays_on_input_after_bad_words() {
    let harness = harness().await;
    let env = RuntimeEnvironment {
        uses_pin_pad: true,
        ..RuntimeEnvironment::default()
    };
    let mut flow = AuthFlow::new(harness.auth.clone(), env);
    flow.start_import(Network::Mainnet);

    match flow
        .submit_import_mnemonic(SecretPhrase::from_phrase("abandon abandon"))
        .await
    {
        Err(WalletError::InvalidMnemonic) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(()) => panic!("expected error"),
    }
    assert_eq!(flow.state(), AuthState::ImportWallet);

    flow.submit_import_mnemonic(SecretPhrase::from_phrase(BIP39_PHRASE))
        .await
        .expect("valid words");
    assert_eq!(flow.state(), AuthState::CreatePin);

    flow.submit_password(password(PASSWORD)).await.expect("import");
    assert_eq!(flow.state(), AuthState::Disclaimer);
    flow.close_disclaimer().unwrap();
    assert_eq!(flow.state(), AuthState::Ready);
}

#[tokio::test]
async fn test_create_wallet_at_requested_version() {
    let harness = harness().await;
    let phrase = common::native_only_phrase();
    let created = harness
        .auth
        .create_wallet(
            Network::Mainnet,
            &phrase,
            &password(PASSWORD),
            Some(TonWalletVersion::W5),
        )
        .await
        .expect("create wallet");

    let account = harness
        .accounts
        .require_account(&created.account_id)
        .await
        .unwrap();
    assert_eq!(account.wallets[&Chain::Ton].version, Some(TonWalletVersion::W5));

    let default = harness
        .accounts
        .chains()
        .get(Chain::Ton)
        .wallet_from_mnemonic(Network::Mainnet, &phrase, TonWalletVersion::default())
        .await
        .unwrap();
    assert_ne!(created.address_by_chain[&Chain::Ton], default.address);
}

#[tokio::test]
async fn test_second_account_requires_existing_password() {
    let harness = harness().await;
    harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .expect("first import");

    let phrase = common::native_only_phrase();
    match harness
        .auth
        .import_mnemonic(Network::Mainnet, &phrase, &password("different"))
        .await
    {
        Err(WalletError::Crypto) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
    match harness
        .auth
        .create_wallet(Network::Testnet, &phrase, &password("different"), None)
        .await
    {
        Err(WalletError::Crypto) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
    assert_eq!(harness.accounts.list_accounts(None).await.unwrap().len(), 1);

    harness
        .auth
        .import_mnemonic(Network::Mainnet, &phrase, &password(PASSWORD))
        .await
        .expect("same password");
    assert_eq!(harness.accounts.list_accounts(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_view_only_accounts_do_not_pin_a_password() {
    let harness = harness().await;
    let addresses = BTreeMap::from([(Chain::Tron, TRON_ADDRESS.to_string())]);
    harness
        .auth
        .import_view_account(Network::Mainnet, &addresses, None)
        .await
        .unwrap();
    harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password("any-first-password"),
        )
        .await
        .expect("first credential sets the password");
}

#[tokio::test]
async fn test_shadow_account_takes_fresh_id_when_mirror_is_taken() {
    let harness = harness_with(core_config()).await;
    let addresses = BTreeMap::from([(Chain::Tron, TRON_ADDRESS.to_string())]);
    let watched = harness
        .auth
        .import_view_account(Network::Testnet, &addresses, None)
        .await
        .unwrap();
    assert_eq!(watched.account_id, AccountId::new(0, Network::Testnet));

    let imported = harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .expect("import");

    assert_eq!(imported.account_id, AccountId::new(0, Network::Mainnet));
    let shadow = imported.second_network_account.expect("shadow account");
    assert_eq!(shadow.account_id, AccountId::new(1, Network::Testnet));
    let untouched = harness
        .accounts
        .require_account(&watched.account_id)
        .await
        .unwrap();
    assert_eq!(untouched.kind(), AccountKind::ViewOnly);
}

#[tokio::test]
async fn test_failed_shadow_write_rolls_back_primary() {
    let (harness, flaky) = flaky_harness(core_config()).await;
    flaky.reject_account_writes(Some(Network::Testnet));

    match harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
    {
        Err(WalletError::Storage(_)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
    assert!(harness.accounts.list_accounts(None).await.unwrap().is_empty());
    assert!(harness
        .storage
        .keys(Namespace::Accounts)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(harness.accounts.current_account_id(), None);

    flaky.reject_account_writes(None);
    let imported = harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &SecretPhrase::from_phrase(BIP39_PHRASE),
            &password(PASSWORD),
        )
        .await
        .expect("retry");
    assert!(imported.second_network_account.is_some());
    assert_eq!(harness.accounts.list_accounts(None).await.unwrap().len(), 2);
    assert_eq!(
        harness.accounts.current_account_id(),
        Some(imported.account_id)
    );
}

#[tokio::test]
async fn test_import_new_wallet_version() {
    let harness = harness().await;
    let source = harness
        .auth
        .import_mnemonic(
            Network::Mainnet,
            &common::native_only_phrase(),
            &password(PASSWORD),
        )
        .await
        .unwrap();

    let added = harness
        .auth
        .import_new_wallet_version(&source.account_id, TonWalletVersion::W5)
        .await
        .expect("new version");
    assert_eq!(added.account_id, AccountId::new(1, Network::Mainnet));
    assert_eq!(harness.accounts.current_account_id(), Some(added.account_id.clone()));
    assert_ne!(
        added.address_by_chain[&Chain::Ton],
        source.address_by_chain[&Chain::Ton]
    );

    let original = harness
        .accounts
        .require_account(&source.account_id)
        .await
        .unwrap();
    let copy = harness
        .accounts
        .require_account(&added.account_id)
        .await
        .unwrap();
    assert_eq!(copy.encrypted_mnemonic(), original.encrypted_mnemonic());
    assert_eq!(copy.wallets[&Chain::Ton].version, Some(TonWalletVersion::W5));
    assert_eq!(
        copy.wallets[&Chain::Ton].public_key,
        original.wallets[&Chain::Ton].public_key
    );
    assert_eq!(copy.title.as_deref(), Some("Wallet 2"));

    match harness
        .auth
        .import_new_wallet_version(&added.account_id, TonWalletVersion::W5)
        .await
    {
        Err(WalletError::InvalidInput { attribute, .. }) => assert_eq!(attribute, "version"),
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test]
async fn test_new_wallet_version_needs_a_key() {
    let harness = harness().await;
    let addresses = BTreeMap::from([(Chain::Tron, TRON_ADDRESS.to_string())]);
    let view = harness
        .auth
        .import_view_account(Network::Mainnet, &addresses, None)
        .await
        .unwrap();
    match harness
        .auth
        .import_new_wallet_version(&view.account_id, TonWalletVersion::W5)
        .await
    {
        Err(WalletError::InvalidInput { .. }) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
    match harness
        .auth
        .import_new_wallet_version(&AccountId::new(7, Network::Mainnet), TonWalletVersion::W5)
        .await
    {
        Err(WalletError::AccountNotFound(_)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test]
async fn test_backup_check_indexes_can_be_redrawn() {
    let harness = harness_with(WalletConfig {
        is_bip39_mnemonic_enabled: false,
        ..test_config()
    })
    .await;
    let mut flow = AuthFlow::new(harness.auth.clone(), RuntimeEnvironment::default());
    let words = flow
        .start_creating_wallet(Network::Mainnet)
        .await
        .unwrap()
        .words()
        .to_vec();
    assert!(flow.restart_check_mnemonic_indexes().is_err());
    flow.confirm_mnemonic_shown().unwrap();
    flow.submit_password(password(PASSWORD)).await.unwrap();

    let redrawn = flow.restart_check_mnemonic_indexes().expect("redraw").to_vec();
    assert_eq!(redrawn.len(), 3);
    assert!(redrawn.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(redrawn.iter().all(|index| *index < words.len()));
    assert_eq!(flow.mnemonic_check_indexes(), redrawn.as_slice());
    assert_eq!(flow.state(), AuthState::DisclaimerAndBackup);

    let answers: Vec<String> = redrawn.iter().map(|index| words[*index].clone()).collect();
    assert!(flow.check_mnemonic(&answers).unwrap());
    assert_eq!(flow.state(), AuthState::Ready);
}
