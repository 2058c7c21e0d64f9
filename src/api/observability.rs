//! Request telemetry: one span and one summary event per request, Prometheus
//! series keyed by how the request was resolved, and the fixed response
//! headers every reply carries.

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span, info, info_span, warn};
use uuid::Uuid;

use super::{ApiError, AppState};

const UNMATCHED_ROUTE: &str = "unmatched";

static RESPONSE_HEADERS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
    (header::CACHE_CONTROL, "no-store"),
];

/// How a request was resolved, in the terms clients of this API see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Rejected,
    Unauthenticated,
    Forbidden,
    NotFound,
    EditConflict,
    Failed,
}

impl Outcome {
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Unauthenticated,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::EditConflict,
            400..=499 => Self::Rejected,
            500..=599 => Self::Failed,
            _ => Self::Ok,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Rejected => "rejected",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::EditConflict => "edit_conflict",
            Self::Failed => "failed",
        }
    }
}

/// Handle to the span opened by [`track_requests`]. Inner layers enter spans
/// of their own, so fields are recorded through this handle rather than
/// through `Span::current()`.
#[derive(Clone)]
struct RequestSpan(Span);

/// Attaches the resolved account to the request span.
pub fn record_user(request: &Request, user_id: i64) {
    if let Some(RequestSpan(span)) = request.extensions().get::<RequestSpan>() {
        span.record("user_id", user_id);
    }
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .prometheus_handle
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .ok_or(ApiError::NotFound)
}

pub async fn track_requests(mut request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let route = route_label(&request);

    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        route = %route,
        user_id = tracing::field::Empty,
    );
    request.extensions_mut().insert(RequestSpan(span.clone()));

    async move {
        let response = next.run(request).await;
        let status = response.status();
        let outcome = Outcome::from_status(status);
        let elapsed = started.elapsed();

        record_metrics(&method, &route, outcome, elapsed);

        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if outcome == Outcome::Failed {
            warn!(
                status = status.as_u16(),
                outcome = outcome.as_str(),
                elapsed_ms,
                "Request failed"
            );
        } else {
            info!(
                status = status.as_u16(),
                outcome = outcome.as_str(),
                elapsed_ms,
                "Request finished"
            );
        }

        response
    }
    .instrument(span)
    .await
}

pub async fn response_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in &RESPONSE_HEADERS {
        headers.insert(name.clone(), HeaderValue::from_static(value));
    }
    response
}

/// Route template rather than the raw path, which carries movie ids.
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |p| p.as_str().to_string())
}

fn record_metrics(method: &Method, route: &str, outcome: Outcome, elapsed: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];

    metrics::counter!("marquee_requests_total", &labels).increment(1);
    metrics::histogram!("marquee_request_duration_seconds", &labels)
        .record(elapsed.as_secs_f64());

    if outcome == Outcome::EditConflict {
        metrics::counter!("marquee_edit_conflicts_total", "route" => route.to_string())
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    #[test]
    fn test_outcome_follows_api_statuses() {
        let cases = [
            (StatusCode::OK, Outcome::Ok),
            (StatusCode::CREATED, Outcome::Ok),
            (StatusCode::BAD_REQUEST, Outcome::Rejected),
            (StatusCode::UNPROCESSABLE_ENTITY, Outcome::Rejected),
            (StatusCode::UNAUTHORIZED, Outcome::Unauthenticated),
            (StatusCode::FORBIDDEN, Outcome::Forbidden),
            (StatusCode::NOT_FOUND, Outcome::NotFound),
            (StatusCode::CONFLICT, Outcome::EditConflict),
            (StatusCode::INTERNAL_SERVER_ERROR, Outcome::Failed),
        ];

        for (status, outcome) in cases {
            assert_eq!(Outcome::from_status(status), outcome, "{status}");
        }
        assert_eq!(Outcome::EditConflict.as_str(), "edit_conflict");
    }

    #[test]
    fn test_route_label_falls_back_without_a_match() {
        let request = http::Request::builder()
            .uri("/v1/movies/42")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), UNMATCHED_ROUTE);
    }

    #[test]
    fn test_record_user_without_request_span_is_a_no_op() {
        let mut request = http::Request::builder().body(Body::empty()).unwrap();
        record_user(&request, 7);

        request.extensions_mut().insert(RequestSpan(Span::none()));
        record_user(&request, 7);
    }
}
