use serde::{Deserialize, Serialize};

use super::AutolockPeriod;

/// Error text shown after a rejected password.
pub const WRONG_PASSWORD_MESSAGE: &str = "Wrong password, please try again.";

/// Which unlock affordance is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnlockSlide {
    /// The unlock button.
    #[default]
    Button,
    /// The password or PIN form.
    Form,
}

/// A lock state transition, as decided by the main surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum LockTransition {
    /// The session locked.
    Locked {
        /// Locked by explicit user action rather than idle timeout.
        manual: bool,
    },
    /// A password or biometric check succeeded.
    Unlocked,
    /// A password or biometric check failed.
    UnlockRejected {
        /// Text to show.
        message: String,
    },
    /// The unlock form was opened or closed.
    SlideChanged {
        /// The slide now shown.
        slide: UnlockSlide,
    },
    /// The PIN pad accepted the PIN.
    PinAccepted,
    /// The pin-accepted flag was dropped.
    PinCleared,
    /// Lock settings changed.
    SettingsChanged {
        /// New idle period.
        autolock: AutolockPeriod,
        /// Whether locking is enabled at all.
        is_app_lock_enabled: bool,
    },
}

/// A sequenced transition. Receivers apply events in sequence order and drop
/// anything not newer than what they already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEvent {
    /// Issued by the main surface, strictly increasing.
    pub seq: u64,
    /// What happened.
    pub transition: LockTransition,
}

/// Replicated lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct LockState {
    /// Whether the session is locked.
    pub is_locked: bool,
    /// Idle period.
    pub autolock: AutolockPeriod,
    /// Whether locking is enabled at all.
    pub is_app_lock_enabled: bool,
    /// The current lock came from explicit user action.
    pub is_manual_lock_active: bool,
    /// Suppress the biometric auto-prompt for this lock.
    pub should_hide_biometrics: bool,
    /// Recently verified through the PIN pad.
    pub is_pin_accepted: bool,
    /// Error from the last unlock attempt.
    pub password_error: Option<String>,
    /// Which unlock affordance is shown.
    pub slide: UnlockSlide,
    /// Sequence number of the last applied event.
    pub applied_seq: u64,
}

impl LockState {
    /// Initial state: locked at startup whenever locking can happen.
    #[must_use]
    pub const fn new(autolock: AutolockPeriod, is_app_lock_enabled: bool) -> Self {
        Self {
            is_locked: is_app_lock_enabled && !matches!(autolock, AutolockPeriod::Never),
            autolock,
            is_app_lock_enabled,
            is_manual_lock_active: false,
            should_hide_biometrics: false,
            is_pin_accepted: false,
            password_error: None,
            slide: UnlockSlide::Button,
            applied_seq: 0,
        }
    }

    /// Locking is possible when a period is set or the user locked explicitly.
    #[must_use]
    pub const fn is_lock_allowed(&self) -> bool {
        !matches!(self.autolock, AutolockPeriod::Never) || self.is_manual_lock_active
    }

    /// Applies `event` unless it is stale. Returns whether the state changed.
    pub fn apply(&mut self, event: &LockEvent) -> bool {
        if event.seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = event.seq;
        match &event.transition {
            LockTransition::Locked { manual } => {
                self.is_locked = true;
                self.is_manual_lock_active = *manual;
                self.should_hide_biometrics = *manual;
                self.is_pin_accepted = false;
                self.password_error = None;
                self.slide = UnlockSlide::Button;
            }
            LockTransition::Unlocked => {
                self.is_locked = false;
                self.is_manual_lock_active = false;
                self.should_hide_biometrics = false;
                self.password_error = None;
                self.slide = UnlockSlide::Button;
            }
            LockTransition::UnlockRejected { message } => {
                self.password_error = Some(message.clone());
                self.is_pin_accepted = false;
            }
            LockTransition::SlideChanged { slide } => {
                self.slide = *slide;
                if *slide == UnlockSlide::Button {
                    self.password_error = None;
                }
            }
            LockTransition::PinAccepted => self.is_pin_accepted = true,
            LockTransition::PinCleared => self.is_pin_accepted = false,
            LockTransition::SettingsChanged {
                autolock,
                is_app_lock_enabled,
            } => {
                self.autolock = *autolock;
                self.is_app_lock_enabled = *is_app_lock_enabled;
            }
        }
        true
    }
}
