use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, AuthenticationTokenDto};
use crate::models::Secret;

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub email: String,
    pub password: Option<Secret>,
}

/// POST /v1/tokens/authentication
pub async fn create_authentication_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthenticationTokenDto>>), ApiError> {
    let Json(input) = payload?;
    let password = input.password.unwrap_or_else(|| Secret::new(""));

    let token = state
        .auth
        .create_authentication_token(&input.email, &password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuthenticationTokenDto::from(&token))),
    ))
}
