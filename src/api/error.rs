use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::db::StoreError;
use crate::services::AuthError;
use crate::validation::FieldErrors;

#[derive(Debug)]
pub enum ApiError {
    NotFound,

    EditConflict,

    BadRequest(String),

    FailedValidation(FieldErrors),

    InvalidCredentials,

    InvalidAuthenticationToken,

    AuthenticationRequired,

    InactiveAccount,

    NotPermitted,

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Not found"),
            Self::EditConflict => write!(f, "Edit conflict"),
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::FailedValidation(fields) => {
                write!(f, "Validation failed on {} field(s)", fields.len())
            }
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::InvalidAuthenticationToken => write!(f, "Invalid authentication token"),
            Self::AuthenticationRequired => write!(f, "Authentication required"),
            Self::InactiveAccount => write!(f, "Inactive account"),
            Self::NotPermitted => write!(f, "Not permitted"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                ApiResponse::<()>::error("the requested resource could not be found"),
            ),
            Self::EditConflict => (
                StatusCode::CONFLICT,
                ApiResponse::<()>::error(
                    "unable to update the record due to an edit conflict, please try again",
                ),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiResponse::<()>::error(msg)),
            Self::FailedValidation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiResponse::<()>::invalid("validation failed", fields),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::<()>::error("invalid authentication credentials"),
            ),
            Self::InvalidAuthenticationToken => {
                let body = ApiResponse::<()>::error("invalid or missing authentication token");
                let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return response;
            }
            Self::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::<()>::error("you must be authenticated to access this resource"),
            ),
            Self::InactiveAccount => (
                StatusCode::FORBIDDEN,
                ApiResponse::<()>::error(
                    "your user account must be activated to access this resource",
                ),
            ),
            Self::NotPermitted => (
                StatusCode::FORBIDDEN,
                ApiResponse::<()>::error(
                    "your user account doesn't have the necessary permissions to access this resource",
                ),
            ),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::<()>::error(
                        "the server encountered a problem and could not process your request",
                    ),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::DuplicateEmail => Self::field(
                "email",
                "a user with this email address already exists",
            ),
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(fields) => Self::FailedValidation(fields),
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::InvalidToken => Self::InvalidAuthenticationToken,
            AuthError::AuthenticationRequired => Self::AuthenticationRequired,
            AuthError::InactiveAccount => Self::InactiveAccount,
            AuthError::NotPermitted(_) => Self::NotPermitted,
            AuthError::Store(e) => e.into(),
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn field(key: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(key.to_string(), message.to_string());
        Self::FailedValidation(fields)
    }
}
