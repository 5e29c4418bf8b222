//! Administrative endpoints. ADMIN role only.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::Role;
use crate::state::AppState;

/// Rate limiter statistics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub buckets: usize,
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

/// Create the admin router.
pub fn router() -> Router<AppState> {
    Router::new().route("/admin/rate-limit", get(rate_limit_stats))
}

async fn rate_limit_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<RateLimitStats>> {
    user.require_role(Role::Admin)?;

    let limiter = state.rate_limiter();
    let config = limiter.config();
    Ok(Json(RateLimitStats {
        buckets: limiter.bucket_count(),
        requests_per_window: config.requests_per_window,
        window_seconds: config.window.as_secs(),
    }))
}
