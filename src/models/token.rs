//! Bearer tokens.
//!
//! A token is 16 random bytes rendered as unpadded base32, which always
//! yields exactly 26 characters from `A-Z2-7`. Only the SHA-256 hash of the
//! plaintext is ever stored or used as a lookup key.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length of a plaintext token.
pub const TOKEN_LENGTH: usize = 26;

const RANDOM_BYTES: usize = 16;

/// What a token may be used for. Lookups never cross scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-way, deterministic digest of a plaintext token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    pub fn of(plaintext: &str) -> Self {
        Self(Sha256::digest(plaintext.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough to tell hashes apart in logs without dumping the digest.
        write!(f, "TokenHash({:02x}{:02x}{:02x}{:02x}..)", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// A freshly issued token. The plaintext exists only in this value.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(skip)]
    pub user_id: i64,
    /// Expiry, seconds since the unix epoch.
    pub expiry: u64,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Issue a new random token for `user_id`.
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let mut bytes = [0u8; RANDOM_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let plaintext = BASE32_NOPAD.encode(&bytes);

        Self {
            hash: TokenHash::of(&plaintext),
            plaintext,
            user_id,
            expiry: unix_now().saturating_add(ttl.as_secs()),
            scope,
        }
    }
}

/// Whether `plaintext` has the shape of a token we could have issued.
pub fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH
        && plaintext
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}

/// Current time in whole seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
