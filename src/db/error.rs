use sea_orm::{DbErr, SqlErr};
use std::time::Duration;
use thiserror::Error;

use crate::models::CredentialError;

/// Failures surfaced by the repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The version precondition of a conditional update matched no row: the
    /// record was changed or deleted since the caller read it.
    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("storage call exceeded {0:?}")]
    Timeout(Duration),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl StoreError {
    /// True when the underlying failure is a unique-constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        )
    }
}
