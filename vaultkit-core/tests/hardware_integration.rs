mod common;

use std::sync::{atomic::Ordering, Arc};

use common::{harness, FakeCompanionTab, FakeDevice};
use vaultkit_core::{
    accounts::AccountKind,
    bridge::{ChannelBridge, SurfaceAction},
    config::{HardwareConfig, Network, RuntimeEnvironment, SurfaceRole},
    hardware::{
        AvailableTransports, HardwareError, HardwarePairing, HardwareState, PairingEntry,
        Transport,
    },
    HardwareConnectionKind,
};

fn pairing(device: Arc<FakeDevice>) -> HardwarePairing {
    HardwarePairing::new(
        HardwareConfig::default(),
        RuntimeEnvironment::default(),
        device,
    )
}

async fn wait_for_connect_call(device: &FakeDevice) {
    while device.connects.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_no_transport_is_terminal_unsupported() {
    let device = Arc::new(FakeDevice::new(AvailableTransports::default()));
    let pairing = pairing(device.clone());

    match pairing.initialize_modal(Network::Mainnet).await {
        Err(HardwareError::Connection(HardwareConnectionKind::UnsupportedDevice)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(state) => panic!("expected error, got {state:?}"),
    }
    let session = pairing.session();
    assert_eq!(session.state, HardwareState::Failed);
    assert_eq!(
        session.failure,
        Some(HardwareConnectionKind::UnsupportedDevice)
    );
    assert_eq!(device.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_transport_connects_and_imports_selection() {
    let harness = harness().await;
    let device = Arc::new(FakeDevice::usb_only());
    let pairing = pairing(device.clone());

    let state = pairing
        .initialize_modal(Network::Mainnet)
        .await
        .expect("pairing");
    assert_eq!(state, HardwareState::Connected);
    let session = pairing.session();
    assert_eq!(session.transport, Some(Transport::Usb));
    assert_eq!(session.discovered_wallets.len(), 5);

    let selected = pairing.select_wallets(&[3, 1]).expect("selection");
    assert_eq!(
        selected.iter().map(|wallet| wallet.index).collect::<Vec<_>>(),
        vec![1, 3]
    );
    assert_eq!(pairing.session().selected_indices, vec![1, 3]);

    let imported = harness
        .auth
        .import_hardware_wallets(Network::Mainnet, &selected, &pairing.descriptor())
        .await
        .expect("import");
    assert_eq!(imported.len(), 2);
    assert_eq!(
        harness.accounts.current_account_id(),
        Some(imported[0].account_id.clone())
    );
    let account = harness
        .accounts
        .require_account(&imported[1].account_id)
        .await
        .unwrap();
    assert_eq!(account.kind(), AccountKind::Hardware);
    assert_eq!(account.wallets.values().next().unwrap().index, 3);
}

#[tokio::test]
async fn test_unknown_selection_is_rejected() {
    let pairing = pairing(Arc::new(FakeDevice::usb_only()));
    pairing.initialize_modal(Network::Mainnet).await.unwrap();
    for indices in [&[][..], &[42][..]] {
        match pairing.select_wallets(indices) {
            Err(HardwareError::InvalidSelection(_)) => {}
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }
}

#[tokio::test]
async fn test_several_transports_wait_for_choice() {
    let mut device = FakeDevice::new(AvailableTransports {
        usb: true,
        bluetooth: true,
    });
    device.usb_attached = false;
    let pairing = pairing(Arc::new(device));

    let state = pairing.initialize_modal(Network::Testnet).await.unwrap();
    assert_eq!(state, HardwareState::Connect);
    assert_eq!(
        pairing.session().last_used_transport,
        Some(Transport::Bluetooth)
    );

    match pairing.connect_hardware_wallet(None).await {
        Err(HardwareError::InvalidSelection(_)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(state) => panic!("expected error, got {state:?}"),
    }
    let state = pairing
        .connect_hardware_wallet(Some(Transport::Bluetooth))
        .await
        .expect("connect");
    assert_eq!(state, HardwareState::Connected);
    assert_eq!(pairing.session().transport, Some(Transport::Bluetooth));
}

#[tokio::test(start_paused = true)]
async fn test_missing_signing_app_fails_distinctly() {
    let mut device = FakeDevice::usb_only();
    device.app_closed_checks = usize::MAX;
    let device = Arc::new(device);
    let pairing = pairing(device.clone());

    match pairing.initialize_modal(Network::Mainnet).await {
        Err(HardwareError::Connection(HardwareConnectionKind::AppNotFound)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(state) => panic!("expected error, got {state:?}"),
    }
    let session = pairing.session();
    assert_eq!(session.state, HardwareState::Failed);
    assert_eq!(session.failure, Some(HardwareConnectionKind::AppNotFound));
    assert!(device.app_checks.load(Ordering::SeqCst) >= HardwareConfig::default().app_poll_attempts);
    assert!(device.disconnects.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_waiting_for_signing_app_that_never_opens_fails() {
    let mut device = FakeDevice::new(AvailableTransports {
        usb: true,
        bluetooth: true,
    });
    device.app_closed_checks = usize::MAX;
    let device = Arc::new(device);
    let pairing = pairing(device.clone());
    let state = pairing.initialize_modal(Network::Mainnet).await.unwrap();
    assert_eq!(state, HardwareState::Connect);

    assert!(!pairing.wait_for_signing_app().await.expect("poll"));
    let session = pairing.session();
    assert_eq!(session.state, HardwareState::Failed);
    assert_eq!(session.failure, Some(HardwareConnectionKind::AppNotFound));
    assert_eq!(device.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reset_restarts_with_known_transports() {
    let device = FakeDevice::new(AvailableTransports {
        usb: true,
        bluetooth: true,
    });
    let pairing = pairing(Arc::new(device));
    pairing.initialize_modal(Network::Testnet).await.unwrap();
    let before = pairing.session();

    pairing.reset().await;
    let after = pairing.session();
    assert_ne!(after.attempt, before.attempt);
    assert_eq!(after.state, HardwareState::Connect);
    assert_eq!(after.network, Some(Network::Testnet));
    assert_eq!(after.available_transports, before.available_transports);
    assert_eq!(after.last_used_transport, before.last_used_transport);
}

#[tokio::test(start_paused = true)]
async fn test_signing_app_opened_late() {
    let mut device = FakeDevice::usb_only();
    device.app_closed_checks = 3;
    let pairing = pairing(Arc::new(device));
    let state = pairing.initialize_modal(Network::Mainnet).await.unwrap();
    assert_eq!(state, HardwareState::Connected);
}

#[tokio::test]
async fn test_connection_failure() {
    let device = Arc::new(FakeDevice::usb_only().with_connect_results(vec![false]));
    let pairing = pairing(device);
    match pairing.initialize_modal(Network::Mainnet).await {
        Err(HardwareError::Connection(HardwareConnectionKind::ConnectionFailed)) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(state) => panic!("expected error, got {state:?}"),
    }
    assert_eq!(
        pairing.session().failure,
        Some(HardwareConnectionKind::ConnectionFailed)
    );
}

#[tokio::test]
async fn test_cancel_stops_in_flight_attempt() {
    let device = Arc::new(FakeDevice::usb_only());
    device.hang_on_connect.store(true, Ordering::SeqCst);
    let pairing = Arc::new(pairing(device.clone()));

    let task = tokio::spawn({
        let pairing = pairing.clone();
        async move { pairing.initialize_modal(Network::Mainnet).await }
    });
    wait_for_connect_call(&device).await;
    assert_eq!(pairing.session().state, HardwareState::Connecting);

    pairing.cancel().await;

    match task.await.unwrap() {
        Err(HardwareError::Cancelled) => {}
        Err(err) => panic!("unexpected error: {err}"),
        Ok(state) => panic!("expected cancellation, got {state:?}"),
    }
    let session = pairing.session();
    assert_eq!(session.attempt, None);
    assert_eq!(session.state, HardwareState::Connect);
    assert!(device.disconnects.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_new_attempt_supersedes_old_one() {
    let device = Arc::new(FakeDevice::usb_only());
    device.hang_on_connect.store(true, Ordering::SeqCst);
    let pairing = Arc::new(pairing(device.clone()));

    let first = tokio::spawn({
        let pairing = pairing.clone();
        async move { pairing.initialize_modal(Network::Mainnet).await }
    });
    wait_for_connect_call(&device).await;
    let stale_attempt = pairing.session().attempt;

    device.hang_on_connect.store(false, Ordering::SeqCst);
    let state = pairing.initialize_modal(Network::Mainnet).await.unwrap();
    assert_eq!(state, HardwareState::Connected);

    assert!(matches!(
        first.await.unwrap(),
        Err(HardwareError::Cancelled)
    ));
    let session = pairing.session();
    assert_ne!(session.attempt, stale_attempt);
    assert_eq!(session.state, HardwareState::Connected);
    assert_eq!(device.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_companion_tab_handshake() {
    let device = Arc::new(FakeDevice::usb_only().with_connect_results(vec![false]));
    let tab = Arc::new(FakeCompanionTab::default());
    let env = RuntimeEnvironment {
        can_open_companion_tab: true,
        ..RuntimeEnvironment::default()
    };
    let pairing = Arc::new(
        HardwarePairing::new(HardwareConfig::default(), env, device.clone())
            .with_companion_tab(tab.clone()),
    );
    let mut session = pairing.subscribe();

    let task = tokio::spawn({
        let pairing = pairing.clone();
        async move { pairing.initialize_modal(Network::Mainnet).await }
    });
    session
        .wait_for(|session| session.state == HardwareState::WaitingForBrowser)
        .await
        .unwrap();
    while tab.opened.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    tab.close.notify_one();

    assert_eq!(task.await.unwrap().unwrap(), HardwareState::Connected);
    assert_eq!(device.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_delegated_surface_forwards_pairing() {
    let (bridge, mut endpoints) = ChannelBridge::new(SurfaceRole::Delegated);
    let entry = PairingEntry::Delegated(Arc::new(bridge));
    assert_eq!(entry.open_modal(Network::Mainnet).await.unwrap(), None);

    let message = endpoints.main.recv().await.expect("forwarded");
    assert!(matches!(
        message.action,
        SurfaceAction::InitializeHardwareWalletModal {
            network: Network::Mainnet
        }
    ));

    let device = Arc::new(FakeDevice::usb_only());
    let main = Arc::new(pairing(device.clone()));
    main.handle_forwarded(message).await;
    assert_eq!(main.session().state, HardwareState::Connected);
    assert_eq!(device.connects.load(Ordering::SeqCst), 1);

    let entry = PairingEntry::Main(main.clone());
    assert_eq!(
        entry
            .open_connection(Network::Mainnet, Transport::Usb)
            .await
            .unwrap(),
        Some(HardwareState::Connected)
    );
}
