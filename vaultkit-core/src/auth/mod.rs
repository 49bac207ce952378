//! Wallet creation and import.
//!
//! [`AuthService`] performs the operations; [`AuthFlow`] is the screen-level
//! state container that drives them and owns the transient [`AuthSession`].

mod flow;
mod service;

pub use flow::{select_mnemonic_for_check, AuthFlow, AuthMethod, AuthSession, AuthState};
pub use service::{AuthService, ImportedAccount, SecondNetworkAccount};
