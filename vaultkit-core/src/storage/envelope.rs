//! Versioned record envelope persistence helpers.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::error::{StorageError, StorageResult};

const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct RecordEnvelope<T> {
    version: u32,
    record: T,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Encodes `record` as a CBOR envelope tagged with the current version.
pub(crate) fn seal_record<T: Serialize>(record: &T) -> StorageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(
        &RecordEnvelope {
            version: ENVELOPE_VERSION,
            record,
        },
        &mut bytes,
    )
    .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(bytes)
}

/// Decodes an envelope written by [`seal_record`], rejecting unknown versions.
pub(crate) fn open_record<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    let probe: VersionProbe = ciborium::de::from_reader(bytes)
        .map_err(|err| StorageError::InvalidEnvelope(err.to_string()))?;
    if probe.version != ENVELOPE_VERSION {
        return Err(StorageError::UnsupportedEnvelopeVersion(probe.version));
    }
    let envelope: RecordEnvelope<T> = ciborium::de::from_reader(bytes)
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(envelope.record)
}
