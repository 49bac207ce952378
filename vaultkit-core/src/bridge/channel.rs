//! In-process bridge over unbounded channels.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::{SurfaceAction, SurfaceBridge, SurfaceMessage};
use crate::config::SurfaceRole;

/// Receiving ends of a [`ChannelBridge`].
#[derive(Debug)]
pub struct BridgeEndpoints {
    /// Messages for the main surface.
    pub main: UnboundedReceiver<SurfaceMessage>,
    /// Messages for the native host.
    pub native: UnboundedReceiver<SurfaceMessage>,
    /// Messages for delegated surfaces.
    pub delegated: UnboundedReceiver<SurfaceMessage>,
}

/// A [`SurfaceBridge`] for surfaces living in one process, and for tests.
#[derive(Debug)]
pub struct ChannelBridge {
    origin: SurfaceRole,
    seq: AtomicU64,
    main: UnboundedSender<SurfaceMessage>,
    native: UnboundedSender<SurfaceMessage>,
    delegated: UnboundedSender<SurfaceMessage>,
}

impl ChannelBridge {
    /// Creates a bridge stamping messages as sent by `origin`.
    #[must_use]
    pub fn new(origin: SurfaceRole) -> (Self, BridgeEndpoints) {
        let (main_tx, main_rx) = unbounded_channel();
        let (native_tx, native_rx) = unbounded_channel();
        let (delegated_tx, delegated_rx) = unbounded_channel();
        (
            Self {
                origin,
                seq: AtomicU64::new(0),
                main: main_tx,
                native: native_tx,
                delegated: delegated_tx,
            },
            BridgeEndpoints {
                main: main_rx,
                native: native_rx,
                delegated: delegated_rx,
            },
        )
    }

    fn deliver(&self, target: &UnboundedSender<SurfaceMessage>, action: SurfaceAction) {
        let message = SurfaceMessage {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            origin: self.origin,
            action,
        };
        if let Err(err) = target.send(message) {
            tracing::debug!(action = ?err.0.action, "bridge receiver gone, message dropped");
        }
    }
}

impl SurfaceBridge for ChannelBridge {
    fn send_to_main(&self, action: SurfaceAction) {
        self.deliver(&self.main, action);
    }

    fn send_to_native(&self, action: SurfaceAction) {
        self.deliver(&self.native, action);
    }

    fn broadcast(&self, action: SurfaceAction) {
        self.deliver(&self.delegated, action);
    }
}
