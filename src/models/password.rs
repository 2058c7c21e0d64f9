//! Argon2id credential held by every user account.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use std::fmt;
use thiserror::Error;

use super::Secret;
use crate::config::SecurityConfig;
use crate::validation::Validator;

/// Shortest accepted password, in bytes.
pub const MIN_PASSWORD_BYTES: usize = 8;

/// Longest accepted password, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid Argon2 params: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error("Invalid password hash format: {0}")]
    MalformedHash(String),

    #[error("Password verification failed: {0}")]
    Verification(String),
}

/// Cost parameters for new hashes. Existing hashes carry their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl PasswordParams {
    pub const DEFAULT: Self = Self {
        memory_cost_kib: 8192,
        time_cost: 3,
        parallelism: 1,
    };

    fn hasher(&self) -> Result<Argon2<'static>, CredentialError> {
        let params = Params::new(
            self.memory_cost_kib,
            self.time_cost,
            self.parallelism,
            None,
        )
        .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    pub fn check(&self) -> Result<(), CredentialError> {
        self.hasher().map(|_| ())
    }
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&SecurityConfig> for PasswordParams {
    fn from(cfg: &SecurityConfig) -> Self {
        Self {
            memory_cost_kib: cfg.argon2_memory_cost_kib,
            time_cost: cfg.argon2_time_cost,
            parallelism: cfg.argon2_parallelism,
        }
    }
}

/// One-way hash of a user's password.
///
/// The plaintext is kept only on values built by [`Password::set`], so that
/// length rules can be checked before the account is persisted. Values loaded
/// from the database never carry it.
#[derive(Clone)]
pub struct Password {
    plaintext: Option<Secret>,
    hash: String,
}

impl Password {
    /// Hashes `plaintext` with a fresh random salt.
    ///
    /// CPU-bound; async callers should run it under `spawn_blocking`.
    pub fn set(plaintext: Secret, params: &PasswordParams) -> Result<Self, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = params
            .hasher()?
            .hash_password(plaintext.expose().as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string();

        Ok(Self {
            plaintext: Some(plaintext),
            hash,
        })
    }

    #[must_use]
    pub const fn from_hash(hash: String) -> Self {
        Self {
            plaintext: None,
            hash,
        }
    }

    /// Returns `Ok(false)` on a plain mismatch. Any other failure (corrupt
    /// hash, unsupported algorithm) is an error.
    pub fn matches(&self, candidate: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(&self.hash)
            .map_err(|e| CredentialError::MalformedHash(e.to_string()))?;

        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Verification(e.to_string())),
        }
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    #[must_use]
    pub const fn plaintext(&self) -> Option<&Secret> {
        self.plaintext.as_ref()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password").finish_non_exhaustive()
    }
}

pub fn validate_password_plaintext(v: &mut Validator, password: &Secret) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}
