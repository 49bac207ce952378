//! Plaintext secret holders. Contents are zeroized on drop and redacted in `Debug`.

use secrecy::{ExposeSecret, SecretBox};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroizing;

const PRIVATE_KEY_HEX_LEN: usize = 64;

/// A mnemonic word list or a single hex-encoded private key.
pub struct SecretPhrase(SecretBox<Vec<String>>);

impl SecretPhrase {
    /// Wraps `words`, trimming and lowercasing each entry and dropping empties.
    /// The input words are wiped when this returns.
    #[must_use]
    pub fn new(words: Vec<String>) -> Self {
        let words = Zeroizing::new(words);
        let normalized = words
            .iter()
            .map(|word| word.trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        Self(SecretBox::new(Box::new(normalized)))
    }

    /// Splits a space separated phrase.
    #[must_use]
    pub fn from_phrase(phrase: &str) -> Self {
        Self::new(phrase.split_whitespace().map(str::to_string).collect())
    }

    /// The normalized words.
    #[must_use]
    pub fn words(&self) -> &[String] {
        self.0.expose_secret()
    }

    /// Number of words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words().len()
    }

    /// Whether the phrase holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words().is_empty()
    }

    /// A raw private key is recognized by format, not word count: one element of
    /// 64 hex characters.
    #[must_use]
    pub fn is_private_key(&self) -> bool {
        match self.words() {
            [single] => {
                single.len() == PRIVATE_KEY_HEX_LEN
                    && single.bytes().all(|byte| byte.is_ascii_hexdigit())
            }
            _ => false,
        }
    }

    /// The words joined by single spaces.
    #[must_use]
    pub fn joined(&self) -> Zeroizing<String> {
        Zeroizing::new(self.words().join(" "))
    }
}

impl Clone for SecretPhrase {
    fn clone(&self) -> Self {
        Self(SecretBox::new(Box::new(self.words().to_vec())))
    }
}

impl ConstantTimeEq for SecretPhrase {
    fn ct_eq(&self, other: &Self) -> Choice {
        let lhs = self.joined();
        let rhs = other.joined();
        lhs.as_bytes().ct_eq(rhs.as_bytes())
    }
}

impl std::fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPhrase")
            .field("words", &"[REDACTED]")
            .finish()
    }
}
