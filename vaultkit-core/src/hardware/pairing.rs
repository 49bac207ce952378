use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use backon::{ConstantBuilder, Retryable};
use tokio::{sync::watch, time};
use uuid::Uuid;

use super::{
    AvailableTransports, CompanionTab, DiscoveredWallet, HardwareDevice, HardwareError,
    HardwareResult, HardwareSession, HardwareState, Transport,
};
use crate::{
    accounts::HardwareDescriptor,
    bridge::{SurfaceAction, SurfaceMessage},
    config::{HardwareConfig, Network, RuntimeEnvironment},
    error::HardwareConnectionKind,
};

struct Attempt {
    id: Uuid,
    cancel: watch::Sender<bool>,
}

#[derive(Clone)]
struct AttemptHandle {
    id: Uuid,
    cancelled: watch::Receiver<bool>,
}

/// Pairing state machine. Lives on the main surface only.
///
/// Each attempt gets its own id and cancel signal. Starting a new attempt or
/// cancelling stops in-flight device calls, disconnects the device and prevents
/// the old attempt from publishing state.
pub struct HardwarePairing {
    config: HardwareConfig,
    env: RuntimeEnvironment,
    device: Arc<dyn HardwareDevice>,
    companion: Option<Arc<dyn CompanionTab>>,
    session: watch::Sender<HardwareSession>,
    active: Mutex<Option<Attempt>>,
}

impl std::fmt::Debug for HardwarePairing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwarePairing")
            .field("config", &self.config)
            .field("session", &*self.session.borrow())
            .finish_non_exhaustive()
    }
}

impl HardwarePairing {
    /// Creates the pairing flow over `device`.
    #[must_use]
    pub fn new(
        config: HardwareConfig,
        env: RuntimeEnvironment,
        device: Arc<dyn HardwareDevice>,
    ) -> Self {
        let (session, _) = watch::channel(HardwareSession::default());
        Self {
            config,
            env,
            device,
            companion: None,
            session,
            active: Mutex::new(None),
        }
    }

    /// Enables the companion-tab handshake.
    #[must_use]
    pub fn with_companion_tab(mut self, companion: Arc<dyn CompanionTab>) -> Self {
        self.companion = Some(companion);
        self
    }

    /// A snapshot of the session.
    #[must_use]
    pub fn session(&self) -> HardwareSession {
        self.session.borrow().clone()
    }

    /// Observes session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HardwareSession> {
        self.session.subscribe()
    }

    /// Details recorded with accounts imported from the device.
    #[must_use]
    pub fn descriptor(&self) -> HardwareDescriptor {
        self.device.descriptor()
    }

    /// Opens the pairing modal for `network`.
    ///
    /// With one usable transport the connection starts right away. With several,
    /// the flow stays in [`HardwareState::Connect`] with a preselected transport:
    /// USB when a device is attached there, Bluetooth otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareConnectionKind::UnsupportedDevice`] when the host has no
    /// usable transport, without ever entering [`HardwareState::Connecting`].
    pub async fn initialize_modal(&self, network: Network) -> HardwareResult<HardwareState> {
        let attempt = self.begin_attempt(network).await;
        let available = self.detect(&attempt).await?;
        match available.list().as_slice() {
            [] => {
                tracing::warn!("no usable transport for hardware wallet");
                self.fail(&attempt, HardwareConnectionKind::UnsupportedDevice)
            }
            [only] => self.run_connection(&attempt, *only).await,
            _ => {
                let has_usb = self.guard(&attempt, self.device.has_usb_device()).await?;
                let preselected = if has_usb {
                    Transport::Usb
                } else {
                    Transport::Bluetooth
                };
                self.update(&attempt, |session| {
                    session.last_used_transport = Some(preselected);
                })?;
                Ok(HardwareState::Connect)
            }
        }
    }

    /// Opens the modal and connects over `transport` in one go.
    ///
    /// # Errors
    ///
    /// See [`Self::initialize_modal`] and [`Self::connect_hardware_wallet`].
    pub async fn initialize_connection(
        &self,
        network: Network,
        transport: Transport,
    ) -> HardwareResult<HardwareState> {
        let attempt = self.begin_attempt(network).await;
        let available = self.detect(&attempt).await?;
        if available.list().is_empty() {
            return self.fail(&attempt, HardwareConnectionKind::UnsupportedDevice);
        }
        let transport = Self::choose(available, Some(transport))?;
        self.run_connection(&attempt, transport).await
    }

    /// Connects within the open modal. `None` picks the transport only when
    /// exactly one is usable.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InvalidSelection`] without an open modal or with an
    /// unusable or missing transport choice, [`HardwareError::Connection`] when
    /// the device or its signing app cannot be reached, and
    /// [`HardwareError::Cancelled`] when the attempt is superseded.
    pub async fn connect_hardware_wallet(
        &self,
        transport: Option<Transport>,
    ) -> HardwareResult<HardwareState> {
        let attempt = self.current_attempt()?;
        let available = self.session.borrow().available_transports;
        let transport = Self::choose(available, transport)?;
        self.run_connection(&attempt, transport).await
    }

    /// Polls until the signing app is open. Once the poll budget is spent the
    /// device is disconnected, the session moves to [`HardwareState::Failed`]
    /// with [`HardwareConnectionKind::AppNotFound`] and `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Cancelled`] when the attempt is cancelled, or a
    /// device error.
    pub async fn wait_for_signing_app(&self) -> HardwareResult<bool> {
        let attempt = self.current_attempt()?;
        if self.poll_signing_app(&attempt).await? {
            return Ok(true);
        }
        tracing::warn!("signing app did not open");
        self.device.disconnect().await;
        match self.fail(&attempt, HardwareConnectionKind::AppNotFound) {
            Err(HardwareError::Cancelled) => Err(HardwareError::Cancelled),
            _ => Ok(false),
        }
    }

    /// Reads the first `wallet_count` wallets from the device. Persists nothing.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Cancelled`] when the attempt is cancelled, or a
    /// device error.
    pub async fn enumerate_wallets(
        &self,
        network: Network,
    ) -> HardwareResult<Vec<DiscoveredWallet>> {
        let attempt = self.current_attempt()?;
        self.enumerate(&attempt, network).await
    }

    /// Records the user's pick and returns the picked wallets, in index order.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InvalidSelection`] when not connected, when
    /// `indices` is empty or names a wallet that was not discovered.
    pub fn select_wallets(&self, indices: &[u32]) -> HardwareResult<Vec<DiscoveredWallet>> {
        let mut selected = Vec::new();
        let mut outcome = Ok(());
        self.session.send_if_modified(|session| {
            if session.state != HardwareState::Connected {
                outcome = Err(HardwareError::InvalidSelection(
                    "device is not connected".to_string(),
                ));
                return false;
            }
            if indices.is_empty() {
                outcome = Err(HardwareError::InvalidSelection(
                    "no wallet selected".to_string(),
                ));
                return false;
            }
            for index in indices {
                match session
                    .discovered_wallets
                    .iter()
                    .find(|wallet| wallet.index == *index)
                {
                    Some(wallet) => selected.push(wallet.clone()),
                    None => {
                        outcome = Err(HardwareError::InvalidSelection(format!(
                            "wallet {index} was not discovered"
                        )));
                        return false;
                    }
                }
            }
            selected.sort_by_key(|wallet| wallet.index);
            selected.dedup_by_key(|wallet| wallet.index);
            session.selected_indices = selected.iter().map(|wallet| wallet.index).collect();
            true
        });
        outcome.map(|()| selected)
    }

    /// Stops the current attempt and starts over inside the same modal.
    pub async fn reset(&self) {
        let previous = self.session();
        let Some(network) = previous.network else {
            return;
        };
        let attempt = self.begin_attempt(network).await;
        let restored = self.update(&attempt, |session| {
            session.available_transports = previous.available_transports;
            session.last_used_transport = previous.last_used_transport;
        });
        if let Err(err) = restored {
            tracing::debug!(%err, "pairing reset superseded before transports were restored");
        }
    }

    /// Closes the modal: stops the current attempt, disconnects and discards the
    /// session.
    pub async fn cancel(&self) {
        if self.stop_active() {
            tracing::debug!("pairing cancelled");
        }
        self.device.disconnect().await;
        self.session.send_replace(HardwareSession::default());
    }

    /// Runs a pairing request forwarded by a delegated surface.
    pub async fn handle_forwarded(&self, message: SurfaceMessage) {
        let result = match message.action {
            SurfaceAction::InitializeHardwareWalletModal { network } => {
                self.initialize_modal(network).await
            }
            SurfaceAction::InitializeHardwareWalletConnection { network, transport } => {
                self.initialize_connection(network, transport).await
            }
            action => {
                tracing::debug!(?action, "not a pairing request, ignored");
                return;
            }
        };
        if let Err(err) = result {
            tracing::debug!(%err, "forwarded pairing request failed");
        }
    }

    fn choose(
        available: AvailableTransports,
        requested: Option<Transport>,
    ) -> HardwareResult<Transport> {
        match (requested, available.list().as_slice()) {
            (Some(transport), _) if available.contains(transport) => Ok(transport),
            (Some(transport), _) => Err(HardwareError::InvalidSelection(format!(
                "{transport} is not available"
            ))),
            (None, [only]) => Ok(*only),
            (None, []) => Err(HardwareError::Connection(
                HardwareConnectionKind::UnsupportedDevice,
            )),
            (None, _) => Err(HardwareError::InvalidSelection(
                "several transports are available, choose one".to_string(),
            )),
        }
    }

    async fn detect(&self, attempt: &AttemptHandle) -> HardwareResult<AvailableTransports> {
        let available = self
            .guard(attempt, self.device.detect_transports())
            .await?;
        self.update(attempt, |session| session.available_transports = available)?;
        Ok(available)
    }

    async fn run_connection(
        &self,
        attempt: &AttemptHandle,
        transport: Transport,
    ) -> HardwareResult<HardwareState> {
        let result = self.drive_connection(attempt, transport).await;
        match result {
            Err(HardwareError::Cancelled) => Err(HardwareError::Cancelled),
            Err(err) => {
                let kind = match &err {
                    HardwareError::Connection(kind) => *kind,
                    _ => HardwareConnectionKind::ConnectionFailed,
                };
                tracing::warn!(%err, %transport, "hardware pairing failed");
                self.device.disconnect().await;
                let _ = self.fail(attempt, kind);
                Err(err)
            }
            ok => ok,
        }
    }

    async fn drive_connection(
        &self,
        attempt: &AttemptHandle,
        transport: Transport,
    ) -> HardwareResult<HardwareState> {
        self.update(attempt, |session| {
            session.state = HardwareState::Connecting;
            session.transport = Some(transport);
            session.last_used_transport = Some(transport);
            session.failure = None;
            session.discovered_wallets.clear();
            session.selected_indices.clear();
        })?;

        let mut connected = self.guard(attempt, self.device.connect(transport)).await?;
        if !connected && self.env.can_open_companion_tab {
            if let Some(companion) = &self.companion {
                connected = self
                    .pair_through_companion(attempt, companion.as_ref(), transport)
                    .await?;
            }
        }
        if !connected {
            return Err(HardwareError::Connection(
                HardwareConnectionKind::ConnectionFailed,
            ));
        }

        if !self.poll_signing_app(attempt).await? {
            return Err(HardwareError::Connection(
                HardwareConnectionKind::AppNotFound,
            ));
        }

        let network = self
            .session
            .borrow()
            .network
            .ok_or(HardwareError::Cancelled)?;
        let wallets = self.enumerate(attempt, network).await?;
        tracing::info!(%transport, wallets = wallets.len(), "hardware wallet connected");
        self.update(attempt, |session| {
            session.state = HardwareState::Connected;
            session.discovered_wallets = wallets;
        })?;
        Ok(HardwareState::Connected)
    }

    async fn pair_through_companion(
        &self,
        attempt: &AttemptHandle,
        companion: &dyn CompanionTab,
        transport: Transport,
    ) -> HardwareResult<bool> {
        self.update(attempt, |session| {
            session.state = HardwareState::WaitingForBrowser;
        })?;
        let delay = self.config.open_tab_delay();
        self.guard(attempt, async {
            time::sleep(delay).await;
            Ok(())
        })
        .await?;
        self.guard(attempt, companion.open()).await?;
        self.guard(attempt, async {
            companion.closed().await;
            Ok(())
        })
        .await?;

        self.update(attempt, |session| session.state = HardwareState::Connecting)?;
        self.guard(attempt, self.device.connect(transport)).await
    }

    async fn poll_signing_app(&self, attempt: &AttemptHandle) -> HardwareResult<bool> {
        let backoff = ConstantBuilder::default()
            .with_delay(self.config.app_poll_interval())
            .with_max_times(self.config.app_poll_attempts);
        let check_app = || async {
            if self.device.is_signing_app_open().await? {
                Ok(())
            } else {
                Err(HardwareError::Connection(
                    HardwareConnectionKind::AppNotFound,
                ))
            }
        };
        let polled = self
            .guard(
                attempt,
                check_app.retry(backoff).when(|err| {
                    matches!(
                        err,
                        HardwareError::Connection(HardwareConnectionKind::AppNotFound)
                    )
                }),
            )
            .await;
        match polled {
            Ok(()) => Ok(true),
            Err(HardwareError::Connection(HardwareConnectionKind::AppNotFound)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn enumerate(
        &self,
        attempt: &AttemptHandle,
        network: Network,
    ) -> HardwareResult<Vec<DiscoveredWallet>> {
        let mut wallets = Vec::new();
        for index in 0..self.config.wallet_count {
            wallets.push(
                self.guard(attempt, self.device.wallet_at(network, index))
                    .await?,
            );
        }
        Ok(wallets)
    }

    async fn begin_attempt(&self, network: Network) -> AttemptHandle {
        if self.stop_active() {
            self.device.disconnect().await;
        }
        let id = Uuid::new_v4();
        let (cancel, cancelled) = watch::channel(false);
        {
            let mut active = self
                .active
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *active = Some(Attempt { id, cancel });
        }
        self.session.send_replace(HardwareSession {
            attempt: Some(id),
            network: Some(network),
            ..HardwareSession::default()
        });
        tracing::debug!(attempt = %id, %network, "pairing attempt started");
        AttemptHandle { id, cancelled }
    }

    /// Signals the active attempt to stop. Returns whether there was one.
    fn stop_active(&self) -> bool {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        previous.is_some_and(|attempt| {
            attempt.cancel.send_replace(true);
            true
        })
    }

    fn current_attempt(&self) -> HardwareResult<AttemptHandle> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        active
            .as_ref()
            .map(|attempt| AttemptHandle {
                id: attempt.id,
                cancelled: attempt.cancel.subscribe(),
            })
            .ok_or_else(|| HardwareError::InvalidSelection("pairing modal is not open".to_string()))
    }

    /// Races `work` against the attempt's cancel signal.
    async fn guard<T>(
        &self,
        attempt: &AttemptHandle,
        work: impl Future<Output = HardwareResult<T>>,
    ) -> HardwareResult<T> {
        let mut cancelled = attempt.cancelled.clone();
        tokio::select! {
            biased;
            _ = cancelled.wait_for(|cancelled| *cancelled) => Err(HardwareError::Cancelled),
            result = work => result,
        }
    }

    /// Mutates the session if `attempt` still owns it.
    fn update(
        &self,
        attempt: &AttemptHandle,
        change: impl FnOnce(&mut HardwareSession),
    ) -> HardwareResult<()> {
        let mut owned = false;
        self.session.send_if_modified(|session| {
            if session.attempt != Some(attempt.id) {
                return false;
            }
            change(session);
            owned = true;
            true
        });
        if owned {
            Ok(())
        } else {
            Err(HardwareError::Cancelled)
        }
    }

    fn fail(
        &self,
        attempt: &AttemptHandle,
        kind: HardwareConnectionKind,
    ) -> HardwareResult<HardwareState> {
        self.update(attempt, |session| {
            session.state = HardwareState::Failed;
            session.failure = Some(kind);
        })?;
        Err(HardwareError::Connection(kind))
    }
}
