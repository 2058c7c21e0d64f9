use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState, HealthDto};

/// GET /v1/healthcheck
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthDto>> {
    let (status, database) = match state.store.ping().await {
        Ok(()) => ("available", "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            ("degraded", "unavailable")
        }
    };

    Json(ApiResponse::success(HealthDto {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.start_time.elapsed().as_secs(),
        database,
    }))
}
