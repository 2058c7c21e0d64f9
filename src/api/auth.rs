use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{ApiError, AppState, observability};
use crate::models::permission::{MOVIES_READ, MOVIES_WRITE};
use crate::services::Identity;

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the `Authorization: Bearer <token>` header into an [`Identity`]
/// and stores it in the request extensions.
///
/// No header means an anonymous request. A header that is present but
/// malformed, or names a token that does not resolve, is rejected here.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match extract_bearer(request.headers())? {
        None => Identity::Anonymous,
        Some(token) => {
            let user = state.auth.authenticate(&token).await?;
            observability::record_user(&request, user.id);
            Identity::User(user)
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub async fn require_movies_read(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&request);
    state.auth.authorize(&identity, MOVIES_READ).await?;
    Ok(next.run(request).await)
}

pub async fn require_movies_write(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&request);
    state.auth.authorize(&identity, MOVIES_WRITE).await?;
    Ok(next.run(request).await)
}

/// Requests that skipped [`authenticate`] count as anonymous.
fn identity_of(request: &Request) -> Identity {
    request
        .extensions()
        .get::<Identity>()
        .cloned()
        .unwrap_or_default()
}

/// `Ok(None)` when no `Authorization` header is sent at all.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::InvalidAuthenticationToken)?;

    Ok(Some(token.to_string()))
}
