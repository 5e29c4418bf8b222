//! Prometheus metrics endpoint.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::state::AppState;

/// Prometheus text exposition content type.
const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Create the metrics router.
pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

/// Prometheus metrics endpoint.
///
/// The bucket gauge is refreshed on scrape so it is current even when the
/// eviction sweep is disabled.
async fn metrics(State(state): State<AppState>) -> Response {
    state
        .metrics()
        .set_bucket_count(state.rate_limiter().bucket_count());
    let output = state.metrics().encode();

    (StatusCode::OK, [("content-type", CONTENT_TYPE)], output).into_response()
}
