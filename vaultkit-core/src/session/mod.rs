//! Session lock: idle timeout, manual lock and password or biometric unlock,
//! kept consistent across surfaces.
//!
//! The main surface runs [`SessionLock`], the only place lock transitions are
//! decided. Delegated surfaces hold a [`DelegatedLockView`] that forwards
//! intents and replays the sequenced [`LockEvent`]s it receives.

mod activity;
mod autolock;
mod delegated;
mod lock;
mod state;

pub use activity::{ActivityEvent, ActivityThrottle};
pub use autolock::AutolockPeriod;
pub use delegated::DelegatedLockView;
pub use lock::{
    BiometricPrompt, LockAffordances, NoAffordances, SessionLock, UnlockVerifier,
    VaultUnlockVerifier,
};
pub use state::{LockEvent, LockState, LockTransition, UnlockSlide, WRONG_PASSWORD_MESSAGE};
