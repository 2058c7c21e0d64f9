//! Domain service for accounts, tokens and authorization.
//!
//! Handles registration, activation, issuing authentication tokens, resolving
//! bearer tokens to users, and permission checks.

use thiserror::Error;

use crate::db::StoreError;
use crate::models::{CredentialError, Permissions, Secret, Token, User};
use crate::validation::FieldErrors;

/// Errors specific to authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Wrong email or wrong password; the two are never told apart.
    #[error("Invalid authentication credentials")]
    InvalidCredentials,

    /// Malformed, unknown, expired or wrongly scoped bearer token.
    #[error("Invalid or missing authentication token")]
    InvalidToken,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Account must be activated")]
    InactiveAccount,

    #[error("Missing permission: {0}")]
    NotPermitted(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn field(key: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(key.to_string(), message.to_string());
        Self::Validation(errors)
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Blocking task failed: {err}"))
    }
}

/// Who is making a request. Requests without a bearer token are
/// [`Identity::Anonymous`]; it is never an error on its own.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(User),
}

impl Identity {
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user),
        }
    }
}

/// Input for a new account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: Secret,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an inactive account, grants the default permissions and issues
    /// an activation token to the configured notifier.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for bad input or a taken email.
    async fn register(&self, registration: Registration) -> Result<User, AuthError>;

    /// Activates the account owning a live activation token and invalidates
    /// every activation token of that account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] keyed by `token` if the token is
    /// malformed, unknown or expired.
    async fn activate(&self, token_plaintext: &str) -> Result<User, AuthError>;

    /// Checks an email and password pair and issues an authentication token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if either is wrong.
    async fn create_authentication_token(
        &self,
        email: &str,
        password: &Secret,
    ) -> Result<Token, AuthError>;

    /// Resolves a presented bearer token to its owner.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for every failure to resolve.
    async fn authenticate(&self, token_plaintext: &str) -> Result<User, AuthError>;

    async fn permissions_for(&self, user_id: i64) -> Result<Permissions, AuthError>;

    /// Gate for protected operations: the identity must be a known,
    /// activated user holding `code`.
    async fn authorize(&self, identity: &Identity, code: &str) -> Result<(), AuthError>;

    /// Adds permission codes to the account registered under `email`.
    async fn grant(&self, email: &str, codes: &[String]) -> Result<u64, AuthError>;
}
