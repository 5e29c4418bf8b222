//! Expense CRUD routes.
//!
//! All routes require an authenticated caller and only ever touch the
//! caller's own records.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{CreateExpense, Expense, ExpenseFilter, Page, UpdateExpense};
use crate::state::AppState;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Query parameters for listing expenses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ListParams {
    fn filter(&self) -> AppResult<ExpenseFilter> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return Err(AppError::BadRequest(
                "startDate must not be after endDate".to_string(),
            ));
        }

        Ok(ExpenseFilter {
            category: self
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }

    fn page_size(&self) -> usize {
        self.size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Create the expense router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route(
            "/expenses/{id}",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
}

fn validate_amount(amount: f64) -> AppResult<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(AppError::BadRequest("Amount must be positive".to_string()))
    }
}

fn validate_category(category: &str) -> AppResult<()> {
    if category.trim().is_empty() {
        Err(AppError::BadRequest("Category is required".to_string()))
    } else {
        Ok(())
    }
}

fn not_found(id: u64) -> AppError {
    AppError::NotFound(format!("Expense not found with id: {id}"))
}

async fn list_expenses(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<Expense>>> {
    let filter = params.filter()?;
    let page = state.expenses().list(
        user.user_id,
        &filter,
        params.page.unwrap_or(0),
        params.page_size(),
    );
    Ok(Json(page))
}

async fn create_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreateExpense>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    validate_amount(input.amount)?;
    validate_category(&input.category)?;

    let expense = state.expenses().create(user.user_id, input);
    tracing::debug!(user_id = user.user_id, expense_id = expense.id, "expense created");
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn get_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<u64>,
) -> AppResult<Json<Expense>> {
    state
        .expenses()
        .find(user.user_id, id)
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn update_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<u64>,
    Json(changes): Json<UpdateExpense>,
) -> AppResult<Json<Expense>> {
    if let Some(amount) = changes.amount {
        validate_amount(amount)?;
    }
    if let Some(category) = &changes.category {
        validate_category(category)?;
    }

    state
        .expenses()
        .update(user.user_id, id, changes)
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn delete_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<u64>,
) -> AppResult<StatusCode> {
    if state.expenses().delete(user.user_id, id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
