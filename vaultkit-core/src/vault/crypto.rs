//! Password-based sealing of mnemonic material.
//!
//! Argon2id stretches the password, HKDF-SHA256 derives the AEAD key under a
//! domain label, and XChaCha20-Poly1305 seals the joined words. Everything needed
//! to reopen the blob except the password travels inside it.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{secret::SecretPhrase, VaultError, VaultResult};

const BLOB_VERSION: u32 = 1;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 24;
const KEY_SIZE: usize = 32;
const LABEL_MNEMONIC_KEY: &[u8] = b"vaultkit:mnemonic-key:v1";
const LABEL_MNEMONIC_AD: &[u8] = b"vaultkit:mnemonic:v1";

/// Argon2id cost parameters. Stored inside every blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iterations.
    pub t_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    /// Largest multiple of the default cost a blob may ask for. Anything above is
    /// treated as corruption rather than run.
    const MAX_COST_FACTOR: u32 = 4;

    /// Whether every cost is at most four times the default.
    #[must_use]
    pub fn is_within_limits(&self) -> bool {
        let ceiling = Self::default();
        self.m_cost <= ceiling.m_cost.saturating_mul(Self::MAX_COST_FACTOR)
            && self.t_cost <= ceiling.t_cost.saturating_mul(Self::MAX_COST_FACTOR)
            && self.p_cost <= ceiling.p_cost.saturating_mul(Self::MAX_COST_FACTOR)
    }

    /// Minimal cost. Only for tests and local development.
    #[must_use]
    pub const fn light() -> Self {
        Self {
            m_cost: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

/// An encrypted mnemonic blob, base64 text suitable for any key-value store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedMnemonic(String);

impl EncryptedMnemonic {
    /// Wraps a previously produced blob.
    #[must_use]
    pub const fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    /// The encoded blob.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for EncryptedMnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedMnemonic({} bytes)", self.0.len())
    }
}

#[derive(Serialize, Deserialize)]
struct SealedBlob {
    version: u32,
    kdf: KdfParams,
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

fn derive_key(
    password: &SecretString,
    salt: &[u8],
    kdf: KdfParams,
) -> VaultResult<Zeroizing<[u8; KEY_SIZE]>> {
    let params = Params::new(kdf.m_cost, kdf.t_cost, kdf.p_cost, Some(KEY_SIZE))
        .map_err(|_| VaultError::Crypto)?;
    let mut stretched = Zeroizing::new([0u8; KEY_SIZE]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(
            password.expose_secret().as_bytes(),
            salt,
            &mut stretched[..],
        )
        .map_err(|_| VaultError::Crypto)?;

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    Hkdf::<Sha256>::new(Some(salt), &stretched[..])
        .expand(LABEL_MNEMONIC_KEY, &mut key[..])
        .map_err(|_| VaultError::Crypto)?;
    Ok(key)
}

/// Binds the format version and the cost parameters to the ciphertext.
fn associated_data(version: u32, kdf: KdfParams) -> Vec<u8> {
    let mut aad = Vec::with_capacity(LABEL_MNEMONIC_AD.len() + 16);
    aad.extend_from_slice(LABEL_MNEMONIC_AD);
    for field in [version, kdf.m_cost, kdf.t_cost, kdf.p_cost] {
        aad.extend_from_slice(&field.to_be_bytes());
    }
    aad
}

/// Seals `secret` under `password`. Blocking; run off the async executor.
pub(crate) fn seal(
    secret: &SecretPhrase,
    password: &SecretString,
    kdf: KdfParams,
) -> VaultResult<EncryptedMnemonic> {
    if password.expose_secret().is_empty() {
        return Err(VaultError::EmptyPassword);
    }
    if !kdf.is_within_limits() {
        return Err(VaultError::Crypto);
    }

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt, kdf)?;
    let cipher =
        XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| VaultError::Crypto)?;
    let plaintext = secret.joined();
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_bytes(),
                aad: &associated_data(BLOB_VERSION, kdf),
            },
        )
        .map_err(|_| VaultError::Crypto)?;

    let blob = SealedBlob {
        version: BLOB_VERSION,
        kdf,
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
    };
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&blob, &mut bytes).map_err(|_| VaultError::Crypto)?;
    Ok(EncryptedMnemonic(STANDARD.encode(bytes)))
}

/// Opens a blob produced by [`seal`]. Every failure is the same [`VaultError::Crypto`].
pub(crate) fn open(
    encrypted: &EncryptedMnemonic,
    password: &SecretString,
) -> VaultResult<SecretPhrase> {
    let bytes = STANDARD
        .decode(encrypted.as_str())
        .map_err(|_| VaultError::Crypto)?;
    let blob: SealedBlob =
        ciborium::de::from_reader(bytes.as_slice()).map_err(|_| VaultError::Crypto)?;
    if blob.version != BLOB_VERSION
        || blob.nonce.len() != NONCE_SIZE
        || !blob.kdf.is_within_limits()
    {
        return Err(VaultError::Crypto);
    }

    let key = derive_key(password, &blob.salt, blob.kdf)?;
    let cipher =
        XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| VaultError::Crypto)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                XNonce::from_slice(&blob.nonce),
                Payload {
                    msg: &blob.ciphertext,
                    aad: &associated_data(blob.version, blob.kdf),
                },
            )
            .map_err(|_| VaultError::Crypto)?,
    );
    let phrase = std::str::from_utf8(&plaintext).map_err(|_| VaultError::Crypto)?;
    Ok(SecretPhrase::from_phrase(phrase))
}
