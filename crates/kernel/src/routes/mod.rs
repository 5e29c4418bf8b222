//! HTTP route handlers.

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod docs;
pub mod expense;
pub mod health;
pub mod metrics;

use axum::Router;

use crate::middleware;
use crate::state::AppState;

/// Build the application router with the admission pipeline applied.
///
/// Requests pass through metrics, then the rate limiter, then bearer
/// authentication. Rejected credentials therefore still spend quota.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(docs::router())
        .merge(metrics::router())
        .merge(auth::router())
        .merge(expense::router())
        .merge(admin::router())
        .merge(analytics::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate_bearer_token,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::enforce_rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::track_metrics,
        ))
        .with_state(state)
}
