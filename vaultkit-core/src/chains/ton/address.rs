//! User-friendly TON addresses.
//!
//! 36 bytes, url-safe base64: a tag byte (bounceable flag and testnet flag), the
//! workchain, the 32-byte account hash and a CRC16-XMODEM checksum.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};
use sha2::{Digest, Sha256};

use super::TonWalletVersion;
use crate::{
    chains::{ChainError, ChainResult},
    config::Network,
};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TEST_ONLY: u8 = 0x80;
const ENCODED_LEN: usize = 36;
const BASECHAIN: i8 = 0;
const DEFAULT_SUBWALLET_ID: u32 = 698_983_191;
const LABEL_WALLET_STATE: &[u8] = b"vaultkit:ton-wallet-state:v1";

/// A parsed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TonAddress {
    /// Workchain id.
    pub workchain: i8,
    /// Account hash.
    pub hash: [u8; 32],
}

impl TonAddress {
    /// Deterministic local address for `public_key` at `version` on the basechain.
    ///
    /// This is a labelled hash of the key, version and subwallet id, not the hash
    /// of the contract's `StateInit` cell, so it never matches a deployed wallet.
    /// History lookups through [`crate::chains::TonCenterProbe`] only make sense
    /// for addresses obtained elsewhere, such as view-only imports.
    #[must_use]
    pub fn for_wallet(public_key: &[u8; 32], version: TonWalletVersion) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(LABEL_WALLET_STATE);
        hasher.update(version.to_string().as_bytes());
        hasher.update(DEFAULT_SUBWALLET_ID.to_be_bytes());
        hasher.update(public_key);
        Self {
            workchain: BASECHAIN,
            hash: hasher.finalize().into(),
        }
    }

    /// Parses a user-friendly (either base64 alphabet) or raw `wc:hex` address.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidAddress`] on any malformed input.
    pub fn parse(address: &str) -> ChainResult<Self> {
        let invalid = || ChainError::InvalidAddress(address.to_string());

        if let Some((workchain, hash)) = address.split_once(':') {
            let workchain = workchain.parse::<i8>().map_err(|_| invalid())?;
            let hash = hex::decode(hash).map_err(|_| invalid())?;
            return Ok(Self {
                workchain,
                hash: hash.try_into().map_err(|_| invalid())?,
            });
        }

        let bytes = URL_SAFE
            .decode(address)
            .or_else(|_| STANDARD.decode(address))
            .map_err(|_| invalid())?;
        if bytes.len() != ENCODED_LEN {
            return Err(invalid());
        }
        let checksum = u16::from_be_bytes([bytes[34], bytes[35]]);
        if crc16(&bytes[..34]) != checksum {
            return Err(invalid());
        }
        let tag = bytes[0] & !FLAG_TEST_ONLY;
        if tag != TAG_BOUNCEABLE && tag != TAG_NON_BOUNCEABLE {
            return Err(invalid());
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self {
            workchain: i8::from_be_bytes([bytes[1]]),
            hash,
        })
    }

    /// Non-bounceable user-friendly form for `network`.
    #[must_use]
    pub fn to_friendly(&self, network: Network) -> String {
        let mut tag = TAG_NON_BOUNCEABLE;
        if network == Network::Testnet {
            tag |= FLAG_TEST_ONLY;
        }
        let mut bytes = Vec::with_capacity(ENCODED_LEN);
        bytes.push(tag);
        bytes.extend_from_slice(&self.workchain.to_be_bytes());
        bytes.extend_from_slice(&self.hash);
        let checksum = crc16(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        URL_SAFE.encode(bytes)
    }
}

fn crc16(data: &[u8]) -> u16 {
    const POLY: u16 = 0x1021;
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 == 0 {
                crc << 1
            } else {
                (crc << 1) ^ POLY
            };
        }
    }
    crc
}
