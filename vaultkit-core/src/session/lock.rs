use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use super::{
    state::WRONG_PASSWORD_MESSAGE, ActivityEvent, ActivityThrottle, AutolockPeriod, LockEvent,
    LockState, LockTransition, UnlockSlide,
};
use crate::{
    accounts::AccountStore,
    bridge::{SequenceGuard, SurfaceAction, SurfaceBridge, SurfaceMessage},
    config::{LockConfig, RuntimeEnvironment, SurfaceRole},
    error::{WalletError, WalletResult},
    vault::CredentialVault,
};

/// Verifies unlock credentials on behalf of [`SessionLock`].
#[async_trait]
pub trait UnlockVerifier: Send + Sync {
    /// Whether `password` is the wallet password.
    async fn verify_password(&self, password: &SecretString) -> WalletResult<bool>;

    /// Runs the platform biometric prompt and checks what it releases.
    async fn verify_biometrics(&self) -> WalletResult<bool>;
}

/// Platform biometric prompt. On success it releases the password stored under
/// biometric protection, `None` when the user dismissed the prompt.
#[async_trait]
pub trait BiometricPrompt: Send + Sync {
    /// Shows the prompt.
    async fn request_password(&self) -> WalletResult<Option<SecretString>>;
}

/// UI affordances that must disappear while locked, such as an embedded browser.
pub trait LockAffordances: Send + Sync {
    /// Hides them on lock.
    fn hide(&self);

    /// Restores them on unlock.
    fn show(&self);
}

/// [`LockAffordances`] for hosts without any.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAffordances;

impl LockAffordances for NoAffordances {
    fn hide(&self) {}

    fn show(&self) {}
}

/// Checks unlock credentials against the stored credentials.
pub struct VaultUnlockVerifier {
    vault: Arc<CredentialVault>,
    accounts: Arc<AccountStore>,
    biometrics: Option<Arc<dyn BiometricPrompt>>,
}

impl VaultUnlockVerifier {
    /// Creates a verifier over `accounts`.
    #[must_use]
    pub fn new(vault: Arc<CredentialVault>, accounts: Arc<AccountStore>) -> Self {
        Self {
            vault,
            accounts,
            biometrics: None,
        }
    }

    /// Enables biometric unlock through `prompt`.
    #[must_use]
    pub fn with_biometrics(mut self, prompt: Arc<dyn BiometricPrompt>) -> Self {
        self.biometrics = Some(prompt);
        self
    }
}

#[async_trait]
impl UnlockVerifier for VaultUnlockVerifier {
    async fn verify_password(&self, password: &SecretString) -> WalletResult<bool> {
        self.vault.verify_password(&self.accounts, password).await
    }

    async fn verify_biometrics(&self) -> WalletResult<bool> {
        let Some(prompt) = &self.biometrics else {
            return Err(WalletError::invalid_input(
                "biometrics",
                "no biometric prompt configured",
            ));
        };
        match prompt.request_password().await? {
            Some(password) => self.verify_password(&password).await,
            None => Err(WalletError::Cancelled),
        }
    }
}

#[derive(Debug)]
struct ActivityClock {
    last_activity_at: Instant,
    throttle: ActivityThrottle,
}

/// Main-surface lock authority.
///
/// Owns [`LockState`], decides every transition and propagates each one to the
/// delegated surfaces as a sequenced [`LockEvent`].
pub struct SessionLock {
    config: LockConfig,
    env: RuntimeEnvironment,
    bridge: Arc<dyn SurfaceBridge>,
    verifier: Arc<dyn UnlockVerifier>,
    affordances: Arc<dyn LockAffordances>,
    state: watch::Sender<LockState>,
    activity: Mutex<ActivityClock>,
    forwarded: Mutex<HashMap<SurfaceRole, SequenceGuard>>,
}

impl std::fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLock")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionLock {
    /// Creates the authority. The session starts locked whenever locking is
    /// possible.
    #[must_use]
    pub fn new(
        config: LockConfig,
        env: RuntimeEnvironment,
        settings: (AutolockPeriod, bool),
        bridge: Arc<dyn SurfaceBridge>,
        verifier: Arc<dyn UnlockVerifier>,
    ) -> Self {
        let (autolock, is_app_lock_enabled) = settings;
        let (state, _) = watch::channel(LockState::new(autolock, is_app_lock_enabled));
        let activity = ActivityClock {
            last_activity_at: Instant::now(),
            throttle: ActivityThrottle::new(config.activity_latency()),
        };
        Self {
            config,
            env,
            bridge,
            verifier,
            affordances: Arc::new(NoAffordances),
            state,
            activity: Mutex::new(activity),
            forwarded: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the affordances toggled on lock and unlock.
    #[must_use]
    pub fn with_affordances(mut self, affordances: Arc<dyn LockAffordances>) -> Self {
        self.affordances = affordances;
        self
    }

    /// A snapshot of the state.
    #[must_use]
    pub fn state(&self) -> LockState {
        self.state.borrow().clone()
    }

    /// Whether the session is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.borrow().is_locked
    }

    /// Observes state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.state.subscribe()
    }

    /// Time of the last reported activity that passed the throttle.
    #[must_use]
    pub fn last_activity_at(&self) -> Instant {
        self.clock().last_activity_at
    }

    /// Whether the biometric prompt should open by itself for this lock.
    #[must_use]
    pub fn should_prompt_biometrics(&self) -> bool {
        let state = self.state.borrow();
        state.is_locked
            && !state.should_hide_biometrics
            && self.env.is_biometric_auth_enabled
            && self.env.is_native_biometric_supported
    }

    /// Records user activity. Returns whether it moved `last_activity_at`.
    pub fn report_activity(&self, event: ActivityEvent) -> bool {
        let now = Instant::now();
        let mut clock = self.clock();
        if !clock.throttle.pass(now) {
            return false;
        }
        clock.last_activity_at = now;
        tracing::trace!(%event, "activity recorded");
        true
    }

    /// The periodic idle check. Locks when the idle period has elapsed, lock is
    /// enabled and the session is unlocked. Returns whether it locked.
    pub fn check_idle(&self) -> bool {
        let Some(period) = self.state.borrow().autolock.period() else {
            return false;
        };
        let idle_for = Instant::now().saturating_duration_since(self.last_activity_at());
        if idle_for <= period {
            return false;
        }
        self.lock(false)
    }

    /// Runs [`Self::check_idle`] every idle check period until `self` is dropped.
    #[must_use]
    pub fn spawn_idle_checks(self: &Arc<Self>) -> JoinHandle<()> {
        let lock: Weak<Self> = Arc::downgrade(self);
        let period = self.config.idle_check_period();
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(lock) = lock.upgrade() else {
                    break;
                };
                if lock.check_idle() {
                    tracing::info!("session locked after idle timeout");
                }
            }
        })
    }

    /// Locks now, regardless of the idle timer, and suppresses the biometric
    /// auto-prompt for this lock. Returns whether it locked.
    pub fn lock_manually(&self) -> bool {
        self.lock(true)
    }

    /// Unlocks with the wallet password.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Crypto`] for a wrong password, after publishing the
    /// rejection, or the verifier's error.
    pub async fn unlock_with_password(&self, password: &SecretString) -> WalletResult<()> {
        if !self.is_locked() {
            return Ok(());
        }
        if self.verifier.verify_password(password).await? {
            if self.env.uses_pin_pad {
                self.commit(LockTransition::PinAccepted);
            }
            self.unlock();
            Ok(())
        } else {
            self.commit(LockTransition::UnlockRejected {
                message: WRONG_PASSWORD_MESSAGE.to_string(),
            });
            Err(WalletError::Crypto)
        }
    }

    /// Unlocks through the biometric prompt.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] when biometrics are disabled,
    /// [`WalletError::Crypto`] when the released credential is rejected, or the
    /// verifier's error.
    pub async fn unlock_with_biometrics(&self) -> WalletResult<()> {
        if !self.is_locked() {
            return Ok(());
        }
        if !self.env.is_biometric_auth_enabled {
            return Err(WalletError::invalid_input(
                "biometrics",
                "biometric unlock is disabled",
            ));
        }
        if self.verifier.verify_biometrics().await? {
            self.unlock();
            Ok(())
        } else {
            self.commit(LockTransition::UnlockRejected {
                message: WRONG_PASSWORD_MESSAGE.to_string(),
            });
            Err(WalletError::Crypto)
        }
    }

    /// Switches between the unlock button and the unlock form.
    pub fn set_slide(&self, slide: UnlockSlide) {
        self.commit_if(LockTransition::SlideChanged { slide }, |state| {
            state.is_locked && state.slide != slide
        });
    }

    /// Drops the pin-accepted flag.
    pub fn clear_pin_accepted(&self) {
        self.commit_if(LockTransition::PinCleared, |state| state.is_pin_accepted);
    }

    /// Changes the idle period.
    pub fn set_autolock(&self, autolock: AutolockPeriod) {
        let is_app_lock_enabled = self.state.borrow().is_app_lock_enabled;
        self.change_settings(autolock, is_app_lock_enabled);
    }

    /// Enables or disables locking.
    pub fn set_app_lock_enabled(&self, is_app_lock_enabled: bool) {
        let autolock = self.state.borrow().autolock;
        self.change_settings(autolock, is_app_lock_enabled);
    }

    /// Applies an intent forwarded by a delegated surface. Duplicate and stale
    /// deliveries from the same origin are dropped.
    pub async fn handle_forwarded(&self, message: SurfaceMessage) {
        if !self.accept_forwarded(message.origin, message.seq) {
            tracing::debug!(seq = message.seq, "stale forwarded message dropped");
            return;
        }
        match message.action {
            SurfaceAction::SubmitAppLockActivity(event) => {
                self.report_activity(event);
            }
            SurfaceAction::RequestManualLock => {
                self.lock_manually();
            }
            SurfaceAction::SubmitUnlockPassword(password) => {
                if let Err(err) = self.unlock_with_password(&password).await {
                    tracing::debug!(%err, "forwarded unlock rejected");
                }
            }
            SurfaceAction::ClearPinAccepted => self.clear_pin_accepted(),
            action => tracing::debug!(?action, "not a lock intent, ignored"),
        }
    }

    fn lock(&self, manual: bool) -> bool {
        let locked = self
            .commit_if(LockTransition::Locked { manual }, |state| {
                !state.is_locked && state.is_app_lock_enabled
            })
            .is_some();
        if locked {
            self.affordances.hide();
            self.bridge.send_to_native(SurfaceAction::HideDelegatedSheet);
        }
        locked
    }

    fn unlock(&self) {
        if self
            .commit_if(LockTransition::Unlocked, |state| state.is_locked)
            .is_none()
        {
            return;
        }
        self.touch();
        self.affordances.show();
        self.bridge.send_to_native(SurfaceAction::ShowDelegatedSheet);
    }

    fn change_settings(&self, autolock: AutolockPeriod, is_app_lock_enabled: bool) {
        let transition = LockTransition::SettingsChanged {
            autolock,
            is_app_lock_enabled,
        };
        if self
            .commit_if(transition, |state| {
                state.autolock != autolock || state.is_app_lock_enabled != is_app_lock_enabled
            })
            .is_some()
        {
            self.touch();
        }
    }

    fn touch(&self) {
        let mut clock = self.clock();
        clock.last_activity_at = Instant::now();
        clock.throttle.reset();
    }

    fn commit(&self, transition: LockTransition) -> Option<LockEvent> {
        self.commit_if(transition, |_| true)
    }

    /// Issues the next sequence number and applies `transition` when `allowed`
    /// holds, atomically with respect to other commits. Propagates the event.
    fn commit_if(
        &self,
        transition: LockTransition,
        allowed: impl FnOnce(&LockState) -> bool,
    ) -> Option<LockEvent> {
        let mut issued = None;
        self.state.send_if_modified(|state| {
            if !allowed(state) {
                return false;
            }
            let event = LockEvent {
                seq: state.applied_seq + 1,
                transition,
            };
            let changed = state.apply(&event);
            issued = Some(event);
            changed
        });
        let event = issued?;
        tracing::debug!(seq = event.seq, transition = ?event.transition, "lock state changed");
        self.bridge
            .broadcast(SurfaceAction::LockStateChanged(event.clone()));
        Some(event)
    }

    fn accept_forwarded(&self, origin: SurfaceRole, seq: u64) -> bool {
        let mut guards = self
            .forwarded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guards.entry(origin).or_default().accept(seq)
    }

    fn clock(&self) -> MutexGuard<'_, ActivityClock> {
        self.activity
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
