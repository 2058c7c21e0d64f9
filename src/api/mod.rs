use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{ActivationNotifier, AuthService, LogNotifier, SeaOrmAuthService};

pub mod auth;
mod error;
mod health;
mod movies;
mod observability;
mod tokens;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use movies::EXPECTED_VERSION_HEADER;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

pub fn create_app_state(
    config: Config,
    store: Store,
    notifier: Arc<dyn ActivationNotifier>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let auth = Arc::new(SeaOrmAuthService::new(
        store.clone(),
        &config.security,
        notifier,
    )?);

    Ok(Arc::new(AppState {
        config: Arc::new(config),
        store,
        auth,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    }))
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::from_config(&config).await?;
    create_app_state(config, store, Arc::new(LogNotifier), prometheus_handle)
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/v1", create_v1_router(state.clone()))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::response_headers))
        .layer(middleware::from_fn(observability::track_requests))
}

fn create_v1_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let can_read = middleware::from_fn_with_state(state.clone(), auth::require_movies_read);
    let can_write = middleware::from_fn_with_state(state.clone(), auth::require_movies_write);

    Router::new()
        .route("/healthcheck", get(health::healthcheck))
        .route("/users", post(users::register_user))
        .route("/users/activated", put(users::activate_user))
        .route(
            "/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .route(
            "/movies",
            post(movies::create_movie).route_layer(can_write.clone()),
        )
        .route(
            "/movies/{id}",
            get(movies::show_movie).route_layer(can_read).merge(
                axum::routing::patch(movies::update_movie)
                    .delete(movies::delete_movie)
                    .route_layer(can_write),
            ),
        )
        .layer(middleware::from_fn_with_state(state, auth::authenticate))
}
