use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use tokio::{sync::watch, time::Instant};

use super::{ActivityEvent, ActivityThrottle, LockEvent, LockState};
use crate::{
    bridge::{SurfaceAction, SurfaceBridge, SurfaceMessage},
    config::LockConfig,
};

/// Lock state as seen from a delegated surface.
///
/// The state here is a cache of what the main surface propagated and may lag
/// behind it. Every intent goes to the main surface; nothing here unlocks.
pub struct DelegatedLockView {
    bridge: Arc<dyn SurfaceBridge>,
    state: watch::Sender<LockState>,
    throttle: Mutex<ActivityThrottle>,
}

impl std::fmt::Debug for DelegatedLockView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedLockView")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl DelegatedLockView {
    /// Creates a view seeded with `initial`, usually the main surface's state at
    /// the time this surface opened.
    #[must_use]
    pub fn new(config: &LockConfig, initial: LockState, bridge: Arc<dyn SurfaceBridge>) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            bridge,
            state,
            throttle: Mutex::new(ActivityThrottle::new(config.activity_latency())),
        }
    }

    /// The cached state.
    #[must_use]
    pub fn state(&self) -> LockState {
        self.state.borrow().clone()
    }

    /// Whether the cached state is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.borrow().is_locked
    }

    /// Observes cache updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.state.subscribe()
    }

    /// Forwards activity to the main surface, at most once per latency window.
    /// Returns whether it was forwarded.
    pub fn report_activity(&self, event: ActivityEvent) -> bool {
        let passed = self
            .throttle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pass(Instant::now());
        if passed {
            self.bridge
                .send_to_main(SurfaceAction::SubmitAppLockActivity(event));
        }
        passed
    }

    /// Asks the main surface to lock now.
    pub fn request_lock(&self) {
        self.bridge.send_to_main(SurfaceAction::RequestManualLock);
    }

    /// Hands a password to the main surface for verification. The outcome
    /// arrives later as a propagated event.
    pub fn submit_password(&self, password: SecretString) {
        self.bridge
            .send_to_main(SurfaceAction::SubmitUnlockPassword(password));
    }

    /// Asks the main surface to drop the pin-accepted flag.
    pub fn clear_pin_accepted(&self) {
        self.bridge.send_to_main(SurfaceAction::ClearPinAccepted);
    }

    /// Applies a propagated transition unless it is stale.
    pub fn apply(&self, event: &LockEvent) -> bool {
        let applied = self.state.send_if_modified(|state| state.apply(event));
        if !applied {
            tracing::debug!(seq = event.seq, "stale lock event ignored");
        }
        applied
    }

    /// Handles a message delivered to this surface.
    pub fn handle_message(&self, message: &SurfaceMessage) -> bool {
        match &message.action {
            SurfaceAction::LockStateChanged(event) => self.apply(event),
            _ => false,
        }
    }
}
