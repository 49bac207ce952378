//! SLIP-0010 ed25519 derivation. Hardened children only.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::{ChainError, ChainResult};

type HmacSha512 = Hmac<Sha512>;

const MASTER_SECRET: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Derives the ed25519 private key at `path` (e.g. `m/44'/607'/0'`) from a BIP39 seed.
pub(crate) fn derive_ed25519(seed: &[u8], path: &str) -> ChainResult<Zeroizing<[u8; 32]>> {
    let indices = parse_path(path)?;
    let (mut key, mut chain_code) = split(hmac_sha512(MASTER_SECRET, &[seed][..])?);

    for index in indices {
        let (child_key, child_chain_code) = split(hmac_sha512(
            chain_code.as_slice(),
            &[&[0u8][..], key.as_slice(), &index.to_be_bytes()[..]],
        )?);
        key = child_key;
        chain_code = child_chain_code;
    }
    Ok(key)
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> ChainResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|err| ChainError::Derivation(format!("hmac init failed: {err}")))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split(buf: Zeroizing<[u8; 64]>) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&buf[..32]);
    right.copy_from_slice(&buf[32..]);
    (left, right)
}

fn parse_path(path: &str) -> ChainResult<Vec<u32>> {
    let mut segments = path.split('/');
    if segments.next() != Some("m") {
        return Err(ChainError::Derivation(format!("path must start with m: {path}")));
    }
    segments
        .map(|segment| {
            let index = segment
                .strip_suffix('\'')
                .ok_or_else(|| {
                    ChainError::Derivation(format!("ed25519 requires hardened segments: {path}"))
                })?
                .parse::<u32>()
                .map_err(|_| ChainError::Derivation(format!("bad path segment: {segment}")))?;
            if index >= HARDENED_OFFSET {
                return Err(ChainError::Derivation(format!("index out of range: {segment}")));
            }
            Ok(index | HARDENED_OFFSET)
        })
        .collect()
}
