use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    chains::ChainError, hardware::HardwareError, storage::StorageError,
    vault::VaultError,
};

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Error outputs from `VaultKit`
#[derive(Debug, Error)]
pub enum WalletError {
    /// The input matches none of the recognized mnemonic dialects
    #[error("invalid_mnemonic")]
    InvalidMnemonic,
    /// Wrong password or corrupted ciphertext. Never says which.
    #[error("crypto_error")]
    Crypto,
    /// An internal consistency check failed. The detail is for logs only.
    #[error("debug_error")]
    Debug(String),
    /// The signing device could not be used
    #[error("hardware_connection_error: {0}")]
    HardwareConnection(HardwareConnectionKind),
    /// Unexpected failure inside an asynchronous flow
    #[error("server_error: {0}")]
    Server(String),
    /// The referenced account does not exist
    #[error("account_not_found: {0}")]
    AccountNotFound(String),
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that failed validation
        attribute: String,
        /// Why it failed
        reason: String,
    },
    /// The operation was cancelled by the user
    #[error("cancelled")]
    Cancelled,
    /// Durable storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Distinguishes the hardware failures the UI remediates differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum HardwareConnectionKind {
    /// The transport could not reach the device.
    ConnectionFailed,
    /// The device is connected but its signing application is not open.
    AppNotFound,
    /// The host exposes no usable transport.
    UnsupportedDevice,
}

impl WalletError {
    pub(crate) fn invalid_input(attribute: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }

    /// Builds a [`WalletError::Debug`] and records the detail verbatim.
    pub(crate) fn debug(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(%detail, "internal consistency check failed");
        Self::Debug(detail)
    }

    /// Whether the user can retry the same step in place.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Crypto | Self::HardwareConnection(_))
    }
}

impl From<VaultError> for WalletError {
    fn from(error: VaultError) -> Self {
        match error {
            VaultError::EmptyPassword | VaultError::Crypto => Self::Crypto,
            VaultError::Task(detail) => Self::Server(detail),
        }
    }
}

impl From<ChainError> for WalletError {
    fn from(error: ChainError) -> Self {
        match error {
            ChainError::InvalidMnemonic => Self::InvalidMnemonic,
            ChainError::InvalidAddress(address) => {
                Self::invalid_input("address", format!("not a valid address: {address}"))
            }
            ChainError::InvalidPrivateKey => {
                Self::invalid_input("private_key", "not a valid private key")
            }
            other => Self::Server(other.to_string()),
        }
    }
}

impl From<HardwareError> for WalletError {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::Cancelled => Self::Cancelled,
            HardwareError::Connection(kind) => Self::HardwareConnection(kind),
            other => Self::Server(other.to_string()),
        }
    }
}

/// Serializable error descriptor. This is what crosses a surface boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "detail")]
pub enum ApiErrorCode {
    /// See [`WalletError::InvalidMnemonic`].
    InvalidMnemonic,
    /// See [`WalletError::Crypto`].
    Crypto,
    /// Reported generically; the detail stays in the logs.
    Debug,
    /// See [`WalletError::HardwareConnection`].
    HardwareConnection(HardwareConnectionKind),
    /// See [`WalletError::Cancelled`].
    Cancelled,
    /// Everything else.
    Server,
}

impl From<&WalletError> for ApiErrorCode {
    fn from(error: &WalletError) -> Self {
        match error {
            WalletError::InvalidMnemonic => Self::InvalidMnemonic,
            WalletError::Crypto => Self::Crypto,
            WalletError::Debug(_) => Self::Debug,
            WalletError::HardwareConnection(kind) => Self::HardwareConnection(*kind),
            WalletError::Cancelled => Self::Cancelled,
            WalletError::Server(_)
            | WalletError::AccountNotFound(_)
            | WalletError::InvalidInput { .. }
            | WalletError::Storage(_) => Self::Server,
        }
    }
}

/// Tagged result: either `{"ok": payload}` or `{"error": descriptor}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiResponse<T> {
    /// Success payload.
    Ok(T),
    /// Error descriptor.
    Error(ApiErrorCode),
}

impl<T> ApiResponse<T> {
    /// Converts a core result into its boundary shape. Unexpected failures are
    /// logged and collapsed into [`ApiErrorCode::Server`].
    pub fn from_result(result: WalletResult<T>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(error) => {
                let code = ApiErrorCode::from(&error);
                if code == ApiErrorCode::Server {
                    tracing::error!(%error, "unexpected failure");
                }
                Self::Error(code)
            }
        }
    }

    /// Returns the error descriptor, if any.
    pub const fn error(&self) -> Option<&ApiErrorCode> {
        match self {
            Self::Ok(_) => None,
            Self::Error(code) => Some(code),
        }
    }
}
