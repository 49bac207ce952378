//! `vaultkit-core` is the identity and session-security core of a multi-chain
//! wallet.
//!
//! - [`vault`] encrypts mnemonic material under the wallet password.
//! - [`chains`] classifies mnemonics and derives one wallet per chain (TON
//!   primary, Tron secondary).
//! - [`accounts`] owns network-scoped account records.
//! - [`auth`] creates and imports accounts.
//! - [`hardware`] pairs external signing devices.
//! - [`session`] locks the session on idle or request and unlocks it on a
//!   verified password or biometric check.
//! - [`bridge`] carries intents and lock transitions between UI surfaces that
//!   share no memory.

pub mod accounts;
pub mod auth;
pub mod bridge;
pub mod chains;
pub mod config;
pub mod hardware;
pub mod logger;
pub mod session;
pub mod storage;
pub mod vault;

mod error;
pub use error::*;

// private modules
mod http_request;

pub use accounts::{Account, AccountId, AccountKind, AccountStore};
pub use auth::{AuthFlow, AuthService, ImportedAccount};
pub use chains::{Chain, ChainRegistry, ChainWallet};
pub use config::{Network, RuntimeEnvironment, SurfaceRole, WalletConfig};
pub use hardware::{HardwarePairing, PairingEntry};
pub use session::{DelegatedLockView, SessionLock};
pub use vault::{CredentialVault, SecretPhrase};
