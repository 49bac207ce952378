//! TON-native mnemonic standard.
//!
//! Words come from the BIP39 English list but carry no BIP39 checksum. The
//! phrase is hashed into entropy, and a phrase is valid when a cheap PBKDF2 over
//! that entropy starts with a zero byte.

use bip39::Language;
use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::{
    chains::{ChainError, ChainResult},
    vault::SecretPhrase,
};

/// Words in a TON-native mnemonic.
pub const MNEMONIC_WORD_COUNT: usize = 24;

const PBKDF_ITERATIONS: u32 = 100_000;
const BASIC_SEED_ITERATIONS: u32 = PBKDF_ITERATIONS / 256;
const BASIC_SEED_SALT: &[u8] = b"TON seed version";
const DEFAULT_SEED_SALT: &[u8] = b"TON default seed";

fn entropy(phrase: &SecretPhrase) -> ChainResult<Zeroizing<[u8; 64]>> {
    let joined = phrase.joined();
    let mac = Hmac::<Sha512>::new_from_slice(joined.as_bytes())
        .map_err(|err| ChainError::Derivation(format!("hmac init failed: {err}")))?;
    // Passwords on native mnemonics are unsupported, so the message is empty.
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn is_basic_seed(entropy: &[u8; 64]) -> bool {
    let mut probe = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2::<Hmac<Sha512>>(entropy, BASIC_SEED_SALT, BASIC_SEED_ITERATIONS, &mut probe[..]);
    probe[0] == 0
}

/// Whether every word is in the list and the phrase passes the seed check.
#[must_use]
pub fn validate(phrase: &SecretPhrase) -> bool {
    let words = phrase.words();
    if words.len() != MNEMONIC_WORD_COUNT
        || !words
            .iter()
            .all(|word| Language::English.find_word(word).is_some())
    {
        return false;
    }
    entropy(phrase).is_ok_and(|entropy| is_basic_seed(&*entropy))
}

/// Generates a fresh phrase. Blocking: each candidate costs a short PBKDF2 run
/// and roughly one in 256 candidates is accepted.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn generate() -> ChainResult<SecretPhrase> {
    let list = Language::English.word_list();
    let mut rng = OsRng;
    loop {
        let words = (0..MNEMONIC_WORD_COUNT)
            .map(|_| list[rng.gen_range(0..list.len())].to_string())
            .collect();
        let candidate = SecretPhrase::new(words);
        let hashed = entropy(&candidate)?;
        if is_basic_seed(&*hashed) {
            return Ok(candidate);
        }
    }
}

/// Derives the signing key. Blocking: runs the full PBKDF2.
///
/// # Errors
///
/// Returns [`ChainError::InvalidMnemonic`] if the phrase does not validate.
pub fn signing_key(phrase: &SecretPhrase) -> ChainResult<SigningKey> {
    if !validate(phrase) {
        return Err(ChainError::InvalidMnemonic);
    }
    let entropy = entropy(phrase)?;
    let mut seed = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2::<Hmac<Sha512>>(&entropy[..], DEFAULT_SEED_SALT, PBKDF_ITERATIONS, &mut seed[..]);
    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&seed[..32]);
    Ok(SigningKey::from_bytes(&secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_phrase_validates() {
        let phrase = generate().expect("generate");
        assert_eq!(phrase.len(), MNEMONIC_WORD_COUNT);
        assert!(validate(&phrase));
    }

    #[test]
    fn test_rejects_wrong_word_count_and_unknown_words() {
        let phrase = generate().expect("generate");
        let short = SecretPhrase::new(phrase.words()[..12].to_vec());
        assert!(!validate(&short));

        let mut words = phrase.words().to_vec();
        words[3] = "notaword".to_string();
        assert!(!validate(&SecretPhrase::new(words)));
    }

    #[test]
    fn test_signing_key_is_deterministic() {
        let phrase = generate().expect("generate");
        let a = signing_key(&phrase).expect("derive");
        let b = signing_key(&phrase).expect("derive");
        assert_eq!(a.verifying_key(), b.verifying_key());
    }
}
