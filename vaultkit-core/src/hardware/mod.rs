//! Hardware wallet pairing.
//!
//! `Connect -> Connecting -> Connected | Failed | WaitingForBrowser`, driven by
//! [`HardwarePairing`] on the main surface. The device connection is a singleton:
//! delegated surfaces go through [`PairingEntry`], which forwards the request.

mod device;
mod entry;
mod pairing;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use device::{AvailableTransports, CompanionTab, DiscoveredWallet, HardwareDevice, Transport};
pub use entry::PairingEntry;
pub use pairing::HardwarePairing;

use crate::{config::Network, error::HardwareConnectionKind};

/// Result type for pairing operations.
pub type HardwareResult<T> = Result<T, HardwareError>;

/// Pairing failures.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// The device or host could not be used. See [`HardwareConnectionKind`].
    #[error("hardware connection failed: {0}")]
    Connection(HardwareConnectionKind),
    /// The attempt was cancelled or replaced by a newer one.
    #[error("pairing cancelled")]
    Cancelled,
    /// The device answered with an error.
    #[error("device error: {0}")]
    Device(String),
    /// The selection does not match the discovered wallets.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

/// Pairing progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HardwareState {
    /// Waiting for the user to pick a transport.
    #[default]
    Connect,
    /// Connecting and waiting for the signing app.
    Connecting,
    /// Wallets discovered.
    Connected,
    /// The attempt failed. See [`HardwareSession::failure`].
    Failed,
    /// A companion tab is doing the handshake.
    WaitingForBrowser,
}

/// State of one pairing attempt. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSession {
    /// Current attempt, `None` when no modal is open.
    pub attempt: Option<Uuid>,
    /// Network wallets are enumerated on.
    pub network: Option<Network>,
    /// Transport of the current attempt.
    pub transport: Option<Transport>,
    /// What the host offers.
    pub available_transports: AvailableTransports,
    /// Preselected transport.
    pub last_used_transport: Option<Transport>,
    /// Progress.
    pub state: HardwareState,
    /// Why the attempt failed.
    pub failure: Option<HardwareConnectionKind>,
    /// Wallets offered for import.
    pub discovered_wallets: Vec<DiscoveredWallet>,
    /// Indices picked by the user.
    pub selected_indices: Vec<u32>,
}
