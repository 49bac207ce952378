//! Runtime configuration, feature flags and host capability queries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{chains::ton::TonWalletVersion, error::WalletError, vault::KdfParams};

/// The network an account lives on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Test network.
    Testnet,
}

impl Network {
    /// The paired network used for shadow accounts.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Mainnet => Self::Testnet,
            Self::Testnet => Self::Mainnet,
        }
    }
}

/// Which surface this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurfaceRole {
    /// The main surface. Sole authority for lock state and the device connection.
    #[default]
    Main,
    /// A delegated overlay surface that forwards security intents to the main one.
    Delegated,
}

/// Host capability flags. Consumed read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RuntimeEnvironment {
    /// Which surface this process is.
    pub surface: SurfaceRole,
    /// The user enabled device biometrics for unlocking.
    pub is_biometric_auth_enabled: bool,
    /// The platform offers native biometric prompts.
    pub is_native_biometric_supported: bool,
    /// Unlock goes through a custom PIN pad instead of a password field.
    pub uses_pin_pad: bool,
    /// Direct device access is impossible but a companion browser tab can pair.
    pub can_open_companion_tab: bool,
}

impl RuntimeEnvironment {
    /// Whether this process is a delegated surface.
    #[must_use]
    pub fn is_delegated(&self) -> bool {
        self.surface == SurfaceRole::Delegated
    }
}

/// Hardware pairing tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// How many wallets are offered for selection.
    pub wallet_count: u32,
    /// Delay between signing-app checks.
    pub app_poll_interval_ms: u64,
    /// Checks before giving up on the signing app.
    pub app_poll_attempts: usize,
    /// Delay before the companion tab is opened.
    pub open_tab_delay_ms: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            wallet_count: 5,
            app_poll_interval_ms: 1_000,
            app_poll_attempts: 30,
            open_tab_delay_ms: 500,
        }
    }
}

impl HardwareConfig {
    /// See [`Self::app_poll_interval_ms`].
    #[must_use]
    pub const fn app_poll_interval(&self) -> Duration {
        Duration::from_millis(self.app_poll_interval_ms)
    }

    /// See [`Self::open_tab_delay_ms`].
    #[must_use]
    pub const fn open_tab_delay(&self) -> Duration {
        Duration::from_millis(self.open_tab_delay_ms)
    }
}

/// Session lock tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Activity is reported at most once per this window.
    pub activity_latency_ms: u64,
    /// Period of the idle check.
    pub idle_check_period_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            activity_latency_ms: 5_000,
            idle_check_period_ms: 5_000,
        }
    }
}

impl LockConfig {
    /// See [`Self::activity_latency_ms`].
    #[must_use]
    pub const fn activity_latency(&self) -> Duration {
        Duration::from_millis(self.activity_latency_ms)
    }

    /// See [`Self::idle_check_period_ms`]. Never shorter than one millisecond.
    #[must_use]
    pub const fn idle_check_period(&self) -> Duration {
        let period_ms = if self.idle_check_period_ms == 0 {
            1
        } else {
            self.idle_check_period_ms
        };
        Duration::from_millis(period_ms)
    }
}

/// Chain indexer endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToncenterConfig {
    /// Mainnet API base.
    pub mainnet_url: String,
    /// Testnet API base.
    pub testnet_url: String,
}

impl Default for ToncenterConfig {
    fn default() -> Self {
        Self {
            mainnet_url: "https://toncenter.com/api/v2".to_string(),
            testnet_url: "https://testnet.toncenter.com/api/v2".to_string(),
        }
    }
}

impl ToncenterConfig {
    /// The base url for `network`.
    #[must_use]
    pub fn url(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.mainnet_url,
            Network::Testnet => &self.testnet_url,
        }
    }
}

/// Wallet-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Accept BIP39 mnemonics and derive the secondary chain from them.
    pub is_bip39_mnemonic_enabled: bool,
    /// Every primary-network account gets a shadow account on the paired network.
    pub is_core_wallet: bool,
    /// Wallet contract version for newly derived primary-chain wallets.
    pub default_wallet_version: TonWalletVersion,
    /// Words the user re-enters to prove a backup.
    pub mnemonic_check_count: usize,
    /// Password hashing cost.
    pub kdf: KdfParams,
    /// Hardware pairing tunables.
    pub hardware: HardwareConfig,
    /// Session lock tunables.
    pub lock: LockConfig,
    /// Chain indexer endpoints.
    pub toncenter: ToncenterConfig,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            is_bip39_mnemonic_enabled: true,
            is_core_wallet: false,
            default_wallet_version: TonWalletVersion::default(),
            mnemonic_check_count: 3,
            kdf: KdfParams::default(),
            hardware: HardwareConfig::default(),
            lock: LockConfig::default(),
            toncenter: ToncenterConfig::default(),
        }
    }
}

impl WalletConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidInput`] if the JSON is malformed, the idle
    /// check period is zero or the KDF cost is out of bounds.
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| WalletError::invalid_input("config", err.to_string()))?;
        if config.lock.idle_check_period_ms == 0 {
            return Err(WalletError::invalid_input(
                "lock.idle_check_period_ms",
                "must be positive",
            ));
        }
        if !config.kdf.is_within_limits() {
            return Err(WalletError::invalid_input("kdf", "cost above the supported ceiling"));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = WalletConfig::from_json(
            r#"{"is_core_wallet": true, "hardware": {"wallet_count": 10}}"#,
        )
        .expect("parse");
        assert!(config.is_core_wallet);
        assert!(config.is_bip39_mnemonic_enabled);
        assert_eq!(config.hardware.wallet_count, 10);
        assert_eq!(config.hardware.open_tab_delay_ms, 500);
        assert_eq!(config.lock.idle_check_period(), Duration::from_secs(5));
    }

    #[test]
    fn test_malformed_json_is_invalid_input() {
        match WalletConfig::from_json("{") {
            Err(WalletError::InvalidInput { attribute, .. }) => assert_eq!(attribute, "config"),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_zero_idle_check_period() {
        match WalletConfig::from_json(r#"{"lock": {"idle_check_period_ms": 0}}"#) {
            Err(WalletError::InvalidInput { attribute, .. }) => {
                assert_eq!(attribute, "lock.idle_check_period_ms");
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
        let lock = LockConfig {
            idle_check_period_ms: 0,
            ..LockConfig::default()
        };
        assert_eq!(lock.idle_check_period(), Duration::from_millis(1));
    }

    #[test]
    fn test_kdf_above_ceiling_is_rejected() {
        match WalletConfig::from_json(r#"{"kdf": {"m_cost": 4294967295, "t_cost": 2, "p_cost": 1}}"#) {
            Err(WalletError::InvalidInput { attribute, .. }) => assert_eq!(attribute, "kdf"),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_network_text_form() {
        assert_eq!(Network::Testnet.to_string(), "testnet");
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!(Network::Mainnet.other(), Network::Testnet);
    }
}
