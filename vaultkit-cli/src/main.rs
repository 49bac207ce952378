//! Developer CLI over a file-backed wallet.

mod commands;

use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use eyre::{eyre, WrapErr};
use vaultkit_core::{
    accounts::AccountStore,
    auth::AuthService,
    chains::{ChainRegistry, NoHistoryProbe},
    config::{Network, WalletConfig},
    storage::FileStore,
    vault::CredentialVault,
};

#[derive(Parser)]
#[command(name = "vaultkit", version, about = "VaultKit developer CLI")]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalOptions {
    /// Directory holding the wallet store.
    #[arg(long, value_name = "DIR", env = "VAULTKIT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Network for commands that create accounts.
    #[arg(long, default_value = "mainnet", env = "VAULTKIT_NETWORK", global = true)]
    network: Network,

    /// JSON file overriding the default configuration.
    #[arg(long, value_name = "FILE", env = "VAULTKIT_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Mnemonic tooling. Touches no stored state.
    Mnemonic {
        #[command(subcommand)]
        cmd: commands::MnemonicCommand,
    },
    /// Create or import wallets.
    Wallet {
        #[command(subcommand)]
        cmd: commands::WalletCommand,
    },
    /// Inspect and manage stored accounts.
    Account {
        #[command(subcommand)]
        cmd: commands::AccountCommand,
    },
    /// Check or rotate the wallet password.
    Password {
        #[command(subcommand)]
        cmd: commands::PasswordCommand,
    },
    /// Remove every account, or only those on `--network` with `--network-only`.
    Reset {
        #[arg(long)]
        network_only: bool,
    },
}

fn default_data_dir() -> eyre::Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("vaultkit"))
        .ok_or_else(|| eyre!("no data directory on this platform, pass --data-dir"))
}

fn load_config(path: Option<&PathBuf>) -> eyre::Result<WalletConfig> {
    let Some(path) = path else {
        return Ok(WalletConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    Ok(WalletConfig::from_json(&json)?)
}

async fn open_service(global: &GlobalOptions) -> eyre::Result<AuthService> {
    let config = load_config(global.config.as_ref())?;
    let data_dir = match &global.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let store = FileStore::open(data_dir.join("wallet.json"))
        .wrap_err_with(|| format!("opening wallet store in {}", data_dir.display()))?;
    tracing::debug!(path = %store.path().display(), "wallet store opened");

    // Locally derived TON addresses are not contract addresses, so an indexer
    // would never report history for them. Ambiguous mnemonics resolve as BIP39.
    let chains = ChainRegistry::standard(Arc::new(NoHistoryProbe));
    let accounts = AccountStore::open(Arc::new(store), chains).await?;
    let vault = CredentialVault::new(config.kdf);
    Ok(AuthService::new(config, Arc::new(vault), Arc::new(accounts)))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    vaultkit_core::logger::init_tracing("warn,vaultkit_core=info")
        .map_err(|err| eyre!("installing tracing subscriber: {err}"))?;
    let cli = Cli::parse();

    let network = cli.global.network;
    match cli.command {
        Command::Mnemonic { cmd } => {
            let service = open_service(&cli.global).await?;
            commands::mnemonic(&service, cmd).await
        }
        Command::Wallet { cmd } => {
            let service = open_service(&cli.global).await?;
            commands::wallet(&service, network, cmd).await
        }
        Command::Account { cmd } => {
            let service = open_service(&cli.global).await?;
            commands::account(&service, cmd).await
        }
        Command::Password { cmd } => {
            let service = open_service(&cli.global).await?;
            commands::password(&service, cmd).await
        }
        Command::Reset { network_only } => {
            let service = open_service(&cli.global).await?;
            if network_only {
                service.remove_network_accounts(network).await?;
            } else {
                service.reset_accounts().await?;
            }
            println!("accounts removed");
            Ok(())
        }
    }
}
