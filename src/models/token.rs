//! Opaque bearer tokens.
//!
//! A token's plaintext is 16 random bytes encoded as unpadded base32, handed
//! to the client exactly once. Only the SHA-256 digest is persisted, so the
//! server cannot recover the plaintext after issuing it.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

use super::Secret;
use crate::validation::Validator;

/// Length of every plaintext this module generates.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub plaintext: Secret,
    pub hash: String,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

impl Token {
    /// Builds a fresh token; `ttl` may be negative (useful for tests).
    #[must_use]
    pub fn generate(user_id: i64, ttl: TimeDelta, scope: Scope) -> Self {
        let plaintext = generate_plaintext();
        let hash = hash_plaintext(plaintext.expose());

        Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

fn generate_plaintext() -> Secret {
    let bytes: [u8; 16] = rand::rng().random();
    Secret::new(base32::encode(
        base32::Alphabet::Rfc4648 { padding: false },
        &bytes,
    ))
}

/// Hex-encoded SHA-256 of a presented or generated plaintext.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}
