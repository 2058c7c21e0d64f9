use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Movie, Token, User};
use crate::validation::FieldErrors;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-field messages for rejected input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            fields: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            fields: None,
        }
    }

    pub fn invalid(message: impl Into<String>, fields: FieldErrors) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            fields: Some(fields),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieDto {
    pub movie: Movie,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageDto {
    pub message: String,
}

/// The single response that carries a token plaintext back to its owner.
#[derive(Debug, Serialize)]
pub struct AuthenticationTokenDto {
    pub authentication_token: IssuedTokenDto,
}

#[derive(Debug, Serialize)]
pub struct IssuedTokenDto {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl From<&Token> for AuthenticationTokenDto {
    fn from(token: &Token) -> Self {
        Self {
            authentication_token: IssuedTokenDto {
                token: token.plaintext.expose().to_string(),
                expiry: token.expiry,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: u64,
    pub database: &'static str,
}
