//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use bip39::{Language, Mnemonic};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use tokio::sync::Notify;
use vaultkit_core::{
    accounts::{AccountStore, HardwareDescriptor},
    auth::AuthService,
    chains::{ton::mnemonic, ChainRegistry, MemoryProbe},
    config::{Network, WalletConfig},
    hardware::{
        AvailableTransports, CompanionTab, DiscoveredWallet, HardwareDevice, HardwareError,
        HardwareResult, Transport,
    },
    session::UnlockVerifier,
    storage::{KeyValueStore, MemoryStore, Namespace, StorageError, StorageKey, StorageResult},
    vault::{CredentialVault, KdfParams, SecretPhrase},
    WalletResult,
};

pub const PASSWORD: &str = "correct-horse";

/// The 12-word BIP39 test vector. Never valid as a TON-native phrase.
pub const BIP39_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

pub fn test_config() -> WalletConfig {
    WalletConfig {
        kdf: KdfParams::light(),
        ..WalletConfig::default()
    }
}

pub struct Harness {
    pub storage: Arc<MemoryStore>,
    pub probe: Arc<MemoryProbe>,
    pub vault: Arc<CredentialVault>,
    pub accounts: Arc<AccountStore>,
    pub auth: Arc<AuthService>,
}

pub async fn harness_with(config: WalletConfig) -> Harness {
    let storage = Arc::new(MemoryStore::new());
    harness_over(config, storage.clone(), storage).await
}

/// A harness whose account store writes through `backend`, which ends in `storage`.
pub async fn harness_over(
    config: WalletConfig,
    storage: Arc<MemoryStore>,
    backend: Arc<dyn KeyValueStore>,
) -> Harness {
    let probe = Arc::new(MemoryProbe::new());
    let chains = ChainRegistry::standard(probe.clone());
    let accounts = Arc::new(
        AccountStore::open(backend, chains)
            .await
            .expect("open account store"),
    );
    let vault = Arc::new(CredentialVault::new(config.kdf));
    let auth = Arc::new(AuthService::new(config, vault.clone(), accounts.clone()));
    Harness {
        storage,
        probe,
        vault,
        accounts,
        auth,
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

/// A harness over a [`FlakyStore`].
pub async fn flaky_harness(config: WalletConfig) -> (Harness, Arc<FlakyStore>) {
    let flaky = Arc::new(FlakyStore::new());
    let harness = harness_over(config, flaky.inner.clone(), flaky.clone()).await;
    (harness, flaky)
}

/// Memory store with scripted write and removal failures.
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    /// Writes to account records on this network fail.
    pub rejected_account_writes: Mutex<Option<Network>>,
    /// Removals in this namespace fail until cleared.
    pub rejected_removals: Mutex<Option<Namespace>>,
    /// The next this-many removals fail, whatever the key.
    pub failing_removals: AtomicUsize,
    pub removal_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
            rejected_account_writes: Mutex::new(None),
            rejected_removals: Mutex::new(None),
            failing_removals: AtomicUsize::new(0),
            removal_calls: AtomicUsize::new(0),
        }
    }

    pub fn reject_account_writes(&self, network: Option<Network>) {
        *self.rejected_account_writes.lock().expect("lock") = network;
    }

    pub fn reject_removals(&self, namespace: Option<Namespace>) {
        *self.rejected_removals.lock().expect("lock") = namespace;
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &StorageKey, value: Vec<u8>) -> StorageResult<()> {
        let rejected = *self.rejected_account_writes.lock().expect("lock");
        if let Some(network) = rejected {
            if key.namespace() == Namespace::Accounts && key.matches_network(network) {
                return Err(StorageError::Backend(format!("write to {key} rejected")));
            }
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &StorageKey) -> StorageResult<()> {
        self.removal_calls.fetch_add(1, Ordering::SeqCst);
        let rejected = *self.rejected_removals.lock().expect("lock");
        if rejected == Some(key.namespace()) {
            return Err(StorageError::Backend(format!("removal of {key} rejected")));
        }
        let pending = self
            .failing_removals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if pending.is_ok() {
            return Err(StorageError::Backend(format!("removal of {key} failed once")));
        }
        self.inner.remove(key).await
    }

    async fn keys(&self, namespace: Namespace) -> StorageResult<Vec<StorageKey>> {
        self.inner.keys(namespace).await
    }
}

/// A 24-word phrase valid both as BIP39 and as a TON-native mnemonic.
pub fn ambiguous_phrase() -> SecretPhrase {
    loop {
        let mut entropy = [0u8; 32];
        OsRng.fill_bytes(&mut entropy);
        let words = Mnemonic::from_entropy(&entropy)
            .expect("entropy length")
            .to_string();
        let phrase = SecretPhrase::from_phrase(&words);
        if mnemonic::validate(&phrase) {
            return phrase;
        }
    }
}

/// A TON-native phrase that is not valid BIP39.
pub fn native_only_phrase() -> SecretPhrase {
    loop {
        let phrase = mnemonic::generate().expect("generate");
        if Mnemonic::parse_in_normalized(Language::English, &phrase.joined()).is_err() {
            return phrase;
        }
    }
}

/// Scripted signing device.
pub struct FakeDevice {
    pub transports: AvailableTransports,
    pub usb_attached: bool,
    pub connect_results: Mutex<Vec<bool>>,
    /// Checks answering "not open" before the app shows up. `usize::MAX` never opens.
    pub app_closed_checks: usize,
    pub app_checks: AtomicUsize,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub hang_on_connect: AtomicBool,
}

impl FakeDevice {
    pub fn new(transports: AvailableTransports) -> Self {
        Self {
            transports,
            usb_attached: true,
            connect_results: Mutex::new(Vec::new()),
            app_closed_checks: 0,
            app_checks: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            hang_on_connect: AtomicBool::new(false),
        }
    }

    pub fn usb_only() -> Self {
        Self::new(AvailableTransports {
            usb: true,
            bluetooth: false,
        })
    }

    /// Results of successive `connect` calls; once exhausted every call succeeds.
    pub fn with_connect_results(self, results: Vec<bool>) -> Self {
        *self.connect_results.lock().expect("lock") = results;
        self
    }
}

#[async_trait]
impl HardwareDevice for FakeDevice {
    async fn detect_transports(&self) -> HardwareResult<AvailableTransports> {
        Ok(self.transports)
    }

    async fn has_usb_device(&self) -> HardwareResult<bool> {
        Ok(self.usb_attached)
    }

    async fn connect(&self, _transport: Transport) -> HardwareResult<bool> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut results = self.connect_results.lock().expect("lock");
        if results.is_empty() {
            Ok(true)
        } else {
            Ok(results.remove(0))
        }
    }

    async fn is_signing_app_open(&self) -> HardwareResult<bool> {
        let seen = self.app_checks.fetch_add(1, Ordering::SeqCst);
        Ok(seen >= self.app_closed_checks)
    }

    async fn wallet_at(&self, _network: Network, index: u32) -> HardwareResult<DiscoveredWallet> {
        if index > 100 {
            return Err(HardwareError::Device("index out of range".to_string()));
        }
        Ok(DiscoveredWallet {
            address: format!("UQ-fake-{index}"),
            public_key: format!("{index:064x}"),
            index,
            version: Default::default(),
        })
    }

    fn descriptor(&self) -> HardwareDescriptor {
        HardwareDescriptor {
            driver: "fake".to_string(),
            device_id: Some("fake-0".to_string()),
            device_name: Some("Fake Device".to_string()),
            app_version: Some("2.1.0".to_string()),
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Companion tab closed on demand.
#[derive(Default)]
pub struct FakeCompanionTab {
    pub opened: AtomicUsize,
    pub close: Notify,
}

#[async_trait]
impl CompanionTab for FakeCompanionTab {
    async fn open(&self) -> HardwareResult<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn closed(&self) {
        self.close.notified().await;
    }
}

/// Accepts [`PASSWORD`] and a scripted biometric outcome.
pub struct FakeVerifier {
    pub biometrics_ok: bool,
    pub checks: AtomicUsize,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self {
            biometrics_ok: true,
            checks: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UnlockVerifier for FakeVerifier {
    async fn verify_password(&self, candidate: &SecretString) -> WalletResult<bool> {
        use secrecy::ExposeSecret;
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(candidate.expose_secret() == PASSWORD)
    }

    async fn verify_biometrics(&self) -> WalletResult<bool> {
        Ok(self.biometrics_ok)
    }
}
