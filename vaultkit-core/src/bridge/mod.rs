//! Cross-surface sync bridge.
//!
//! Surfaces share no memory. They exchange [`SurfaceMessage`]s through a
//! [`SurfaceBridge`]: fire-and-forget, at most once per call, no
//! acknowledgment. Every message carries a sequence stamp so receivers can
//! drop duplicates and stale deliveries.

mod channel;

use std::fmt;

use secrecy::SecretString;

pub use channel::{BridgeEndpoints, ChannelBridge};

use crate::{
    config::{Network, SurfaceRole},
    hardware::Transport,
    session::{ActivityEvent, LockEvent},
};

/// Intents and notifications carried between surfaces.
pub enum SurfaceAction {
    /// A delegated surface saw user activity.
    SubmitAppLockActivity(ActivityEvent),
    /// A delegated surface asks for an immediate lock.
    RequestManualLock,
    /// A delegated surface forwards a password for the main surface to verify.
    SubmitUnlockPassword(SecretString),
    /// A delegated surface asks to drop the pin-accepted flag.
    ClearPinAccepted,
    /// The main surface propagates a lock state transition.
    LockStateChanged(LockEvent),
    /// A delegated surface asks the main surface to start hardware pairing.
    InitializeHardwareWalletModal {
        /// Network to enumerate wallets on.
        network: Network,
    },
    /// A delegated surface asks the main surface to pair over `transport`.
    InitializeHardwareWalletConnection {
        /// Network to enumerate wallets on.
        network: Network,
        /// Chosen transport.
        transport: Transport,
    },
    /// Ask the native host to hide the delegated sheet.
    HideDelegatedSheet,
    /// Ask the native host to show the delegated sheet again.
    ShowDelegatedSheet,
}

impl fmt::Debug for SurfaceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmitAppLockActivity(event) => {
                f.debug_tuple("SubmitAppLockActivity").field(event).finish()
            }
            Self::RequestManualLock => f.write_str("RequestManualLock"),
            Self::SubmitUnlockPassword(_) => f.write_str("SubmitUnlockPassword([REDACTED])"),
            Self::ClearPinAccepted => f.write_str("ClearPinAccepted"),
            Self::LockStateChanged(event) => f.debug_tuple("LockStateChanged").field(event).finish(),
            Self::InitializeHardwareWalletModal { network } => f
                .debug_struct("InitializeHardwareWalletModal")
                .field("network", network)
                .finish(),
            Self::InitializeHardwareWalletConnection { network, transport } => f
                .debug_struct("InitializeHardwareWalletConnection")
                .field("network", network)
                .field("transport", transport)
                .finish(),
            Self::HideDelegatedSheet => f.write_str("HideDelegatedSheet"),
            Self::ShowDelegatedSheet => f.write_str("ShowDelegatedSheet"),
        }
    }
}

/// A stamped action.
#[derive(Debug)]
pub struct SurfaceMessage {
    /// Monotonically increasing per sender.
    pub seq: u64,
    /// Which surface sent it.
    pub origin: SurfaceRole,
    /// The payload.
    pub action: SurfaceAction,
}

/// Delivery contract between surfaces. All calls are fire-and-forget.
pub trait SurfaceBridge: Send + Sync {
    /// Delivers `action` to the main surface.
    fn send_to_main(&self, action: SurfaceAction);

    /// Delivers `action` to the native host.
    fn send_to_native(&self, action: SurfaceAction);

    /// Delivers `action` to every delegated surface.
    fn broadcast(&self, action: SurfaceAction);
}

/// Last-writer-wins filter over sequence stamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceGuard {
    last: Option<u64>,
}

impl SequenceGuard {
    /// Accepts `seq` if it is newer than everything accepted so far.
    pub fn accept(&mut self, seq: u64) -> bool {
        if self.last.is_some_and(|last| seq <= last) {
            return false;
        }
        self.last = Some(seq);
        true
    }

    /// The newest accepted stamp.
    #[must_use]
    pub const fn last(&self) -> Option<u64> {
        self.last
    }
}
