use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::HardwareResult;
use crate::{accounts::HardwareDescriptor, chains::ton::TonWalletVersion, config::Network};

/// Physical link to the signing device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Transport {
    /// USB (HID or WebUSB).
    Usb,
    /// Bluetooth Low Energy.
    Bluetooth,
}

/// What the host can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransports {
    /// USB is usable.
    pub usb: bool,
    /// Bluetooth is usable.
    pub bluetooth: bool,
}

impl AvailableTransports {
    /// Usable transports, USB first.
    #[must_use]
    pub fn list(self) -> Vec<Transport> {
        let mut list = Vec::with_capacity(2);
        if self.usb {
            list.push(Transport::Usb);
        }
        if self.bluetooth {
            list.push(Transport::Bluetooth);
        }
        list
    }

    /// Whether `transport` is usable.
    #[must_use]
    pub const fn contains(self, transport: Transport) -> bool {
        match transport {
            Transport::Usb => self.usb,
            Transport::Bluetooth => self.bluetooth,
        }
    }
}

/// A wallet the device offers for import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredWallet {
    /// Network-bound address.
    pub address: String,
    /// Hex public key.
    pub public_key: String,
    /// Derivation index on the device.
    pub index: u32,
    /// Wallet contract version.
    pub version: TonWalletVersion,
}

/// Driver for an external signing device. The seed never leaves it.
#[async_trait]
pub trait HardwareDevice: Send + Sync {
    /// Queries host capabilities.
    async fn detect_transports(&self) -> HardwareResult<AvailableTransports>;

    /// Whether a device is already attached over USB.
    async fn has_usb_device(&self) -> HardwareResult<bool>;

    /// Opens the link. `false` when the device could not be reached.
    async fn connect(&self, transport: Transport) -> HardwareResult<bool>;

    /// Whether the signing application is open on the device.
    async fn is_signing_app_open(&self) -> HardwareResult<bool>;

    /// The wallet at derivation `index`.
    async fn wallet_at(&self, network: Network, index: u32) -> HardwareResult<DiscoveredWallet>;

    /// Details recorded with accounts imported from this device.
    fn descriptor(&self) -> HardwareDescriptor;

    /// Closes the link. Idempotent.
    async fn disconnect(&self);
}

/// A companion browser tab that performs the device handshake when this runtime
/// cannot reach the device itself.
#[async_trait]
pub trait CompanionTab: Send + Sync {
    /// Opens the tab.
    async fn open(&self) -> HardwareResult<()>;

    /// Resolves once the tab is closed.
    async fn closed(&self);
}
