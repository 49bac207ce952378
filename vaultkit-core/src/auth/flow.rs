use std::sync::Arc;

use rand::seq::index;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::{AuthService, ImportedAccount};
use crate::{
    accounts::{AccountId, HardwareDescriptor},
    config::{Network, RuntimeEnvironment},
    error::{WalletError, WalletResult},
    hardware::DiscoveredWallet,
    vault::SecretPhrase,
};

/// Screen of the create/import flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthState {
    /// No flow running.
    #[default]
    None,
    /// A new mnemonic is shown.
    CreatingWallet,
    /// Password entry for a new wallet.
    CreatePassword,
    /// PIN entry for a new wallet, on PIN-pad hosts.
    CreatePin,
    /// Offer to enable biometric unlock.
    CreateBiometrics,
    /// Backup confirmation of the new mnemonic.
    DisclaimerAndBackup,
    /// Mnemonic entry for an import.
    ImportWallet,
    /// Password entry for an import.
    ImportWalletCreatePassword,
    /// Import done, last notice before the wallet opens.
    Disclaimer,
    /// The wallet is ready.
    Ready,
    /// The about screen.
    About,
}

/// What the flow is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMethod {
    /// Creating a new wallet.
    CreateAccount,
    /// Importing from a mnemonic or private key.
    ImportMnemonic,
    /// Importing from a hardware device.
    ImportHardwareWallet,
}

/// Transient state of one flow. The mnemonic is zeroized when it drops; the
/// password is never kept past the call that uses it.
#[derive(Debug)]
pub struct AuthSession {
    /// What the flow is doing.
    pub method: AuthMethod,
    /// Target network.
    pub network: Network,
    /// The mnemonic, until the flow no longer needs it.
    pub mnemonic: Option<SecretPhrase>,
    /// The created account.
    pub account_id: Option<AccountId>,
    /// Its primary address.
    pub address: Option<String>,
    /// Word positions the user must re-enter, ascending.
    pub mnemonic_check_indexes: Vec<usize>,
}

impl AuthSession {
    fn new(method: AuthMethod, network: Network) -> Self {
        Self {
            method,
            network,
            mnemonic: None,
            account_id: None,
            address: None,
            mnemonic_check_indexes: Vec::new(),
        }
    }
}

/// A sorted random sample of `count` positions out of `total`.
#[must_use]
pub fn select_mnemonic_for_check(total: usize, count: usize) -> Vec<usize> {
    let mut indexes = index::sample(&mut rand::thread_rng(), total, count.min(total)).into_vec();
    indexes.sort_unstable();
    indexes
}

/// State container for the create and import screens.
///
/// Transitions are checked against the current [`AuthState`]; the effects run
/// through [`AuthService`].
pub struct AuthFlow {
    service: Arc<AuthService>,
    env: RuntimeEnvironment,
    state: AuthState,
    previous: AuthState,
    session: Option<AuthSession>,
}

impl AuthFlow {
    /// Creates an idle flow.
    #[must_use]
    pub const fn new(service: Arc<AuthService>, env: RuntimeEnvironment) -> Self {
        Self {
            service,
            env,
            state: AuthState::None,
            previous: AuthState::None,
            session: None,
        }
    }

    /// The current screen.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// The running session.
    #[must_use]
    pub const fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    /// Starts creating a wallet and generates its mnemonic.
    ///
    /// # Errors
    ///
    /// Returns the generation error; the flow stays idle.
    pub async fn start_creating_wallet(&mut self, network: Network) -> WalletResult<&SecretPhrase> {
        self.restart();
        let is_bip39 = self.service.config().is_bip39_mnemonic_enabled;
        let mnemonic = self.service.generate_mnemonic(is_bip39).await?;
        let mut session = AuthSession::new(AuthMethod::CreateAccount, network);
        session.mnemonic_check_indexes = select_mnemonic_for_check(
            mnemonic.len(),
            self.service.config().mnemonic_check_count,
        );
        let session = self.session.insert(session);
        self.state = AuthState::CreatingWallet;
        Ok(session.mnemonic.insert(mnemonic))
    }

    /// Moves from the shown mnemonic to password entry.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] outside [`AuthState::CreatingWallet`].
    pub fn confirm_mnemonic_shown(&mut self) -> WalletResult<()> {
        self.expect_state(&[AuthState::CreatingWallet])?;
        self.state = self.password_state(AuthState::CreatePassword);
        Ok(())
    }

    /// Starts an import.
    pub fn start_import(&mut self, network: Network) {
        self.restart();
        self.session = Some(AuthSession::new(AuthMethod::ImportMnemonic, network));
        self.state = AuthState::ImportWallet;
    }

    /// Accepts the words typed for an import.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidMnemonic`] when no dialect validates; the
    /// flow stays on the input screen.
    pub async fn submit_import_mnemonic(&mut self, mnemonic: SecretPhrase) -> WalletResult<()> {
        self.expect_state(&[AuthState::ImportWallet])?;
        if !self.service.validate_mnemonic(&mnemonic).await {
            return Err(WalletError::InvalidMnemonic);
        }
        self.session_mut()?.mnemonic = Some(mnemonic);
        self.state = self.password_state(AuthState::ImportWalletCreatePassword);
        Ok(())
    }

    /// Accepts the password and creates the account.
    ///
    /// # Errors
    ///
    /// Returns the create or import error; the flow stays on the password screen.
    pub async fn submit_password(&mut self, password: SecretString) -> WalletResult<ImportedAccount> {
        self.expect_state(&[
            AuthState::CreatePassword,
            AuthState::ImportWalletCreatePassword,
            AuthState::CreatePin,
        ])?;
        let session = self.session_ref()?;
        let mnemonic = session
            .mnemonic
            .as_ref()
            .ok_or_else(|| WalletError::invalid_input("mnemonic", "no mnemonic in flow"))?;
        let imported = match session.method {
            AuthMethod::CreateAccount => {
                self.service
                    .create_wallet(session.network, mnemonic, &password, None)
                    .await?
            }
            AuthMethod::ImportMnemonic => {
                self.service
                    .import_mnemonic(session.network, mnemonic, &password)
                    .await?
            }
            AuthMethod::ImportHardwareWallet => {
                return Err(WalletError::invalid_input(
                    "method",
                    "hardware imports take no password",
                ))
            }
        };

        let method = session.method;
        let session = self.session_mut()?;
        session.account_id = Some(imported.account_id.clone());
        session.address = imported.address_by_chain.values().next().cloned();

        let after = match method {
            AuthMethod::CreateAccount => AuthState::DisclaimerAndBackup,
            _ => AuthState::Disclaimer,
        };
        self.state = if self.env.is_native_biometric_supported {
            AuthState::CreateBiometrics
        } else {
            after
        };
        if self.state != AuthState::DisclaimerAndBackup {
            self.drop_secrets_after_creation();
        }
        Ok(imported)
    }

    /// Leaves the biometrics offer.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] outside [`AuthState::CreateBiometrics`].
    pub fn finish_biometrics_setup(&mut self) -> WalletResult<()> {
        self.expect_state(&[AuthState::CreateBiometrics])?;
        self.state = match self.session_ref()?.method {
            AuthMethod::CreateAccount => AuthState::DisclaimerAndBackup,
            _ => AuthState::Disclaimer,
        };
        if self.state != AuthState::DisclaimerAndBackup {
            self.drop_secrets_after_creation();
        }
        Ok(())
    }

    /// Word positions the user must re-enter, ascending.
    #[must_use]
    pub fn mnemonic_check_indexes(&self) -> &[usize] {
        self.session
            .as_ref()
            .map_or(&[], |session| session.mnemonic_check_indexes.as_slice())
    }

    /// Draws new word positions for the backup check, e.g. after a failed attempt.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] outside
    /// [`AuthState::DisclaimerAndBackup`].
    pub fn restart_check_mnemonic_indexes(&mut self) -> WalletResult<&[usize]> {
        self.expect_state(&[AuthState::DisclaimerAndBackup])?;
        let count = self.service.config().mnemonic_check_count;
        let session = self.session_mut()?;
        let total = session.mnemonic.as_ref().map_or(0, SecretPhrase::len);
        session.mnemonic_check_indexes = select_mnemonic_for_check(total, count);
        Ok(&session.mnemonic_check_indexes)
    }

    /// Checks the re-entered words. A match completes the flow.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] outside
    /// [`AuthState::DisclaimerAndBackup`] or when the answer count is wrong.
    pub fn check_mnemonic(&mut self, answers: &[String]) -> WalletResult<bool> {
        self.expect_state(&[AuthState::DisclaimerAndBackup])?;
        let session = self.session_ref()?;
        if answers.len() != session.mnemonic_check_indexes.len() {
            return Err(WalletError::invalid_input(
                "answers",
                format!("expected {} words", session.mnemonic_check_indexes.len()),
            ));
        }
        let words = session
            .mnemonic
            .as_ref()
            .ok_or_else(|| WalletError::invalid_input("mnemonic", "no mnemonic in flow"))?
            .words();
        let matches = session
            .mnemonic_check_indexes
            .iter()
            .zip(answers)
            .all(|(position, answer)| {
                words.get(*position).is_some_and(|word| {
                    bool::from(word.as_bytes().ct_eq(answer.trim().to_lowercase().as_bytes()))
                })
            });
        if matches {
            self.drop_secrets_after_creation();
            self.state = AuthState::Ready;
        }
        Ok(matches)
    }

    /// Skips the backup check; the account is flagged as needing a backup.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] outside
    /// [`AuthState::DisclaimerAndBackup`], or a storage error.
    pub async fn skip_backup(&mut self) -> WalletResult<()> {
        self.expect_state(&[AuthState::DisclaimerAndBackup])?;
        let account_id = self
            .session_ref()?
            .account_id
            .clone()
            .ok_or_else(|| WalletError::invalid_input("account_id", "no account in flow"))?;
        self.service
            .accounts()
            .set_backup_required(&account_id, true)
            .await?;
        self.drop_secrets_after_creation();
        self.state = AuthState::Ready;
        Ok(())
    }

    /// Closes the post-import notice.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] outside [`AuthState::Disclaimer`].
    pub fn close_disclaimer(&mut self) -> WalletResult<()> {
        self.expect_state(&[AuthState::Disclaimer])?;
        self.state = AuthState::Ready;
        Ok(())
    }

    /// Imports the selected device wallets.
    ///
    /// # Errors
    ///
    /// See [`AuthService::import_hardware_wallets`].
    pub async fn import_hardware_wallets(
        &mut self,
        network: Network,
        wallets: &[DiscoveredWallet],
        descriptor: &HardwareDescriptor,
    ) -> WalletResult<Vec<ImportedAccount>> {
        self.restart();
        let imported = self
            .service
            .import_hardware_wallets(network, wallets, descriptor)
            .await?;
        let mut session = AuthSession::new(AuthMethod::ImportHardwareWallet, network);
        session.account_id = imported.first().map(|account| account.account_id.clone());
        self.session = Some(session);
        self.state = AuthState::Ready;
        Ok(imported)
    }

    /// Opens the about screen.
    pub fn open_about(&mut self) {
        if self.state != AuthState::About {
            self.previous = self.state;
            self.state = AuthState::About;
        }
    }

    /// Returns from the about screen.
    pub fn close_about(&mut self) {
        if self.state == AuthState::About {
            self.state = self.previous;
        }
    }

    /// Ends the flow and returns the created account, if any.
    pub fn finish(&mut self) -> Option<AccountId> {
        let account_id = self.session.take().and_then(|session| session.account_id);
        self.state = AuthState::None;
        account_id
    }

    /// Discards the session and its secrets.
    pub fn restart(&mut self) {
        self.session = None;
        self.state = AuthState::None;
        self.previous = AuthState::None;
    }

    const fn password_state(&self, password_screen: AuthState) -> AuthState {
        if self.env.uses_pin_pad {
            AuthState::CreatePin
        } else {
            password_screen
        }
    }

    fn drop_secrets_after_creation(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.mnemonic = None;
        }
    }

    fn expect_state(&self, allowed: &[AuthState]) -> WalletResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WalletError::invalid_input(
                "auth_state",
                format!("unexpected in {:?}", self.state),
            ))
        }
    }

    fn session_ref(&self) -> WalletResult<&AuthSession> {
        self.session
            .as_ref()
            .ok_or_else(|| WalletError::invalid_input("auth_state", "no flow running"))
    }

    fn session_mut(&mut self) -> WalletResult<&mut AuthSession> {
        self.session
            .as_mut()
            .ok_or_else(|| WalletError::invalid_input("auth_state", "no flow running"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_selection_is_sorted_and_distinct() {
        for _ in 0..20 {
            let indexes = select_mnemonic_for_check(24, 3);
            assert_eq!(indexes.len(), 3);
            assert!(indexes.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(indexes.iter().all(|index| *index < 24));
        }
    }

    #[test]
    fn test_check_selection_is_capped() {
        assert_eq!(select_mnemonic_for_check(2, 5), vec![0, 1]);
        assert!(select_mnemonic_for_check(0, 3).is_empty());
    }
}
