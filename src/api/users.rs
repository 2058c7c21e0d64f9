use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, UserDto};
use crate::models::Secret;
use crate::services::Registration;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub password: Option<Secret>,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    #[serde(default)]
    pub token: String,
}

/// POST /v1/users
/// Creates an inactive account. The activation token goes to the notifier,
/// never into the response.
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    let Json(input) = payload?;

    let user = state
        .auth
        .register(Registration {
            name: input.name,
            email: input.email,
            password: input.password.unwrap_or_else(|| Secret::new("")),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto { user })),
    ))
}

/// PUT /v1/users/activated
pub async fn activate_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let Json(input) = payload?;
    let user = state.auth.activate(&input.token).await?;
    Ok(Json(ApiResponse::success(UserDto { user })))
}
