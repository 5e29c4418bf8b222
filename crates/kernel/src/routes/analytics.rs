//! Spending analytics over the caller's own expenses. ADMIN role only.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::Role;
use crate::state::AppState;

/// Create the analytics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics/total", get(total))
        .route("/analytics/category-summary", get(category_summary))
}

/// Sum of the caller's expenses, as a bare JSON number.
async fn total(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<f64>> {
    user.require_role(Role::Admin)?;
    Ok(Json(state.expenses().total(user.user_id)))
}

/// Caller's expenses summed per category: `{"food": 12.5, ...}`.
async fn category_summary(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<BTreeMap<String, f64>>> {
    user.require_role(Role::Admin)?;
    Ok(Json(state.expenses().category_summary(user.user_id)))
}
