use std::sync::Arc;

use super::{HardwarePairing, HardwareResult, HardwareState, Transport};
use crate::{
    bridge::{SurfaceAction, SurfaceBridge},
    config::Network,
};

/// Where pairing requests go from this surface.
///
/// The main surface drives the device itself. A delegated surface forwards the
/// request so that only one device session ever exists.
pub enum PairingEntry {
    /// This is the main surface.
    Main(Arc<HardwarePairing>),
    /// This is a delegated surface.
    Delegated(Arc<dyn SurfaceBridge>),
}

impl std::fmt::Debug for PairingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main(pairing) => f.debug_tuple("Main").field(pairing).finish(),
            Self::Delegated(_) => f.write_str("Delegated"),
        }
    }
}

impl PairingEntry {
    /// Opens the pairing modal. `None` when the request was forwarded.
    ///
    /// # Errors
    ///
    /// See [`HardwarePairing::initialize_modal`].
    pub async fn open_modal(&self, network: Network) -> HardwareResult<Option<HardwareState>> {
        match self {
            Self::Main(pairing) => pairing.initialize_modal(network).await.map(Some),
            Self::Delegated(bridge) => {
                tracing::debug!(%network, "forwarding pairing modal to main surface");
                bridge.send_to_main(SurfaceAction::InitializeHardwareWalletModal { network });
                Ok(None)
            }
        }
    }

    /// Pairs over `transport`. `None` when the request was forwarded.
    ///
    /// # Errors
    ///
    /// See [`HardwarePairing::initialize_connection`].
    pub async fn open_connection(
        &self,
        network: Network,
        transport: Transport,
    ) -> HardwareResult<Option<HardwareState>> {
        match self {
            Self::Main(pairing) => pairing
                .initialize_connection(network, transport)
                .await
                .map(Some),
            Self::Delegated(bridge) => {
                tracing::debug!(%network, %transport, "forwarding pairing to main surface");
                bridge.send_to_main(SurfaceAction::InitializeHardwareWalletConnection {
                    network,
                    transport,
                });
                Ok(None)
            }
        }
    }
}
