use std::collections::BTreeMap;

use clap::Subcommand;
use eyre::bail;
use secrecy::SecretString;
use serde_json::json;
use vaultkit_core::{
    accounts::AccountId,
    auth::AuthService,
    chains::{ton::TonWalletVersion, Chain},
    config::Network,
    vault::SecretPhrase,
    ApiResponse, WalletResult,
};

#[derive(Subcommand)]
pub enum MnemonicCommand {
    /// Print a fresh mnemonic.
    Generate {
        /// Generate a 12-word BIP39 phrase instead of a TON-native one.
        #[arg(long)]
        bip39: bool,
    },
    /// Check a mnemonic against the enabled dialects.
    Validate {
        /// The phrase, space separated.
        #[arg(env = "VAULTKIT_MNEMONIC")]
        words: String,
    },
}

#[derive(Subcommand)]
pub enum WalletCommand {
    /// Generate a mnemonic and store a new wallet under `--password`.
    Create {
        #[arg(long, env = "VAULTKIT_PASSWORD", hide_env_values = true)]
        password: String,
        /// Contract version (`v3R2`, `v4R2`, `W5`). Defaults to the configured one.
        #[arg(long)]
        wallet_version: Option<TonWalletVersion>,
    },
    /// Add an existing account's TON wallet at another contract version.
    AddVersion {
        account_id: AccountId,
        #[arg(long)]
        wallet_version: TonWalletVersion,
    },
    /// Import a mnemonic or a 64-character hex private key.
    Import {
        #[arg(long, env = "VAULTKIT_MNEMONIC", hide_env_values = true)]
        mnemonic: String,
        #[arg(long, env = "VAULTKIT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Track addresses without any secret.
    ImportView {
        #[arg(long)]
        ton: Option<String>,
        #[arg(long)]
        tron: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommand {
    /// List accounts, optionally only those on one network.
    List {
        #[arg(long)]
        only: Option<Network>,
    },
    /// Print the address per chain of one account.
    Addresses { account_id: AccountId },
    /// Make an account current.
    Activate { account_id: AccountId },
    /// Set the display title.
    Rename { account_id: AccountId, title: String },
    /// Remove an account and switch to `--next`.
    Remove {
        account_id: AccountId,
        #[arg(long)]
        next: AccountId,
    },
}

#[derive(Subcommand)]
pub enum PasswordCommand {
    /// Exit with an error unless the password opens the stored credentials.
    Verify {
        #[arg(long, env = "VAULTKIT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Re-encrypt every stored credential under a new password.
    Change {
        #[arg(long, env = "VAULTKIT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, env = "VAULTKIT_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

fn print_json(value: &impl serde::Serialize) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints `result` in the tagged shape embedders see and fails on errors.
fn report<T: serde::Serialize>(result: WalletResult<T>) -> eyre::Result<()> {
    let response = ApiResponse::from_result(result);
    print_json(&response)?;
    match response.error() {
        Some(code) => bail!("request failed: {code:?}"),
        None => Ok(()),
    }
}

pub async fn mnemonic(service: &AuthService, cmd: MnemonicCommand) -> eyre::Result<()> {
    match cmd {
        MnemonicCommand::Generate { bip39 } => {
            let phrase = service.generate_mnemonic(bip39).await?;
            println!("{}", phrase.joined().as_str());
        }
        MnemonicCommand::Validate { words } => {
            let phrase = SecretPhrase::from_phrase(&words);
            if !service.validate_mnemonic(&phrase).await {
                bail!("mnemonic is not valid");
            }
            println!("valid ({} words)", phrase.len());
        }
    }
    Ok(())
}

pub async fn wallet(service: &AuthService, network: Network, cmd: WalletCommand) -> eyre::Result<()> {
    match cmd {
        WalletCommand::Create {
            password,
            wallet_version,
        } => {
            let is_bip39 = service.config().is_bip39_mnemonic_enabled;
            let phrase = service.generate_mnemonic(is_bip39).await?;
            let result = service
                .create_wallet(network, &phrase, &SecretString::from(password), wallet_version)
                .await;
            if result.is_ok() {
                eprintln!("write down the recovery phrase, it is not shown again:");
                eprintln!("{}", phrase.joined().as_str());
            }
            report(result)
        }
        WalletCommand::Import { mnemonic, password } => {
            let phrase = SecretPhrase::from_phrase(&mnemonic);
            report(
                service
                    .import_mnemonic(network, &phrase, &SecretString::from(password))
                    .await,
            )
        }
        WalletCommand::AddVersion {
            account_id,
            wallet_version,
        } => report(
            service
                .import_new_wallet_version(&account_id, wallet_version)
                .await,
        ),
        WalletCommand::ImportView { ton, tron, title } => {
            let addresses: BTreeMap<Chain, String> = [(Chain::Ton, ton), (Chain::Tron, tron)]
                .into_iter()
                .filter_map(|(chain, address)| address.map(|address| (chain, address)))
                .collect();
            report(
                service
                    .import_view_account(network, &addresses, title)
                    .await,
            )
        }
    }
}

pub async fn account(service: &AuthService, cmd: AccountCommand) -> eyre::Result<()> {
    let accounts = service.accounts();
    match cmd {
        AccountCommand::List { only } => {
            let current = accounts.current_account_id();
            let listed: Vec<_> = accounts
                .list_accounts(only)
                .await?
                .into_iter()
                .map(|(account_id, account)| {
                    json!({
                        "id": account_id,
                        "current": current.as_ref() == Some(&account_id),
                        "title": account.title,
                        "kind": account.kind(),
                        "backupRequired": account.is_backup_required,
                        "addresses": account.addresses(),
                    })
                })
                .collect();
            print_json(&listed)
        }
        AccountCommand::Addresses { account_id } => {
            print_json(&accounts.get_addresses_from_account(&account_id).await?)
        }
        AccountCommand::Activate { account_id } => {
            accounts.activate_account(&account_id).await?;
            println!("{account_id} is now current");
            Ok(())
        }
        AccountCommand::Rename { account_id, title } => {
            accounts.rename_account(&account_id, &title).await?;
            Ok(())
        }
        AccountCommand::Remove { account_id, next } => {
            service.remove_account(&account_id, &next).await?;
            println!("{account_id} removed, {next} is now current");
            Ok(())
        }
    }
}

pub async fn password(service: &AuthService, cmd: PasswordCommand) -> eyre::Result<()> {
    match cmd {
        PasswordCommand::Verify { password } => {
            if !service.verify_password(&SecretString::from(password)).await? {
                bail!("wrong password");
            }
            println!("password ok");
            Ok(())
        }
        PasswordCommand::Change {
            password,
            new_password,
        } => {
            let report = service
                .change_password(
                    &SecretString::from(password),
                    &SecretString::from(new_password),
                )
                .await?;
            print_json(&report)?;
            if !report.is_complete() {
                bail!(
                    "{} account(s) still use the old password",
                    report.failed.len()
                );
            }
            Ok(())
        }
    }
}
