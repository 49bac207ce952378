//! Error types for durable storage.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends and record codecs.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Errors coming from the key-value backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or malformed record envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Unsupported envelope version.
    #[error("unsupported envelope version: {0}")]
    UnsupportedEnvelopeVersion(u32),

    /// A composite key could not be parsed.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Backend(error.to_string())
    }
}
