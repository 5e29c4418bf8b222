//! Expense model and in-process store.
//!
//! Every operation is scoped to the owning user: another user's expense is
//! indistinguishable from a missing one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Expense record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: u64,
    #[serde(skip_serializing)]
    pub user_id: u64,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an expense.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpense {
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub expense_date: NaiveDate,
}

/// Partial update. Only provided fields change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpense {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub expense_date: Option<NaiveDate>,
}

/// Listing filters. Date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ExpenseFilter {
    fn matches(&self, expense: &Expense) -> bool {
        self.category
            .as_deref()
            .is_none_or(|c| expense.category == c)
            && self.start_date.is_none_or(|d| expense.expense_date >= d)
            && self.end_date.is_none_or(|d| expense.expense_date <= d)
    }
}

/// One page of results (zero-based page index).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

/// Expense store ordered by id.
#[derive(Debug)]
pub struct ExpenseStore {
    expenses: RwLock<BTreeMap<u64, Expense>>,
    next_id: AtomicU64,
}

impl ExpenseStore {
    pub fn new() -> Self {
        Self {
            expenses: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a new expense for `user_id`.
    pub fn create(&self, user_id: u64, input: CreateExpense) -> Expense {
        let expense = Expense {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id,
            amount: input.amount,
            category: input.category.trim().to_string(),
            description: input.description,
            expense_date: input.expense_date,
            created_at: Utc::now(),
        };
        self.expenses.write().insert(expense.id, expense.clone());
        expense
    }

    /// Find one of the user's expenses.
    pub fn find(&self, user_id: u64, id: u64) -> Option<Expense> {
        self.expenses
            .read()
            .get(&id)
            .filter(|e| e.user_id == user_id)
            .cloned()
    }

    /// Apply a partial update to one of the user's expenses.
    pub fn update(&self, user_id: u64, id: u64, changes: UpdateExpense) -> Option<Expense> {
        let mut expenses = self.expenses.write();
        let expense = expenses.get_mut(&id).filter(|e| e.user_id == user_id)?;

        if let Some(amount) = changes.amount {
            expense.amount = amount;
        }
        if let Some(category) = changes.category {
            expense.category = category.trim().to_string();
        }
        if let Some(description) = changes.description {
            expense.description = Some(description);
        }
        if let Some(expense_date) = changes.expense_date {
            expense.expense_date = expense_date;
        }

        Some(expense.clone())
    }

    /// Delete one of the user's expenses. Returns whether anything was removed.
    pub fn delete(&self, user_id: u64, id: u64) -> bool {
        let mut expenses = self.expenses.write();
        if expenses.get(&id).is_some_and(|e| e.user_id == user_id) {
            expenses.remove(&id);
            true
        } else {
            false
        }
    }

    /// List the user's expenses, newest `expense_date` first.
    pub fn list(
        &self,
        user_id: u64,
        filter: &ExpenseFilter,
        page: usize,
        size: usize,
    ) -> Page<Expense> {
        let mut matching: Vec<Expense> = self
            .expenses
            .read()
            .values()
            .filter(|e| e.user_id == user_id && filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.expense_date
                .cmp(&a.expense_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        let size = size.max(1);
        let total_elements = matching.len();
        let content = matching
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();

        Page {
            content,
            page,
            size,
            total_elements,
            total_pages: total_elements.div_ceil(size),
        }
    }

    /// Sum of all of the user's expense amounts.
    pub fn total(&self, user_id: u64) -> f64 {
        self.expenses
            .read()
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.amount)
            .sum()
    }

    /// The user's expense amounts summed per category.
    pub fn category_summary(&self, user_id: u64) -> BTreeMap<String, f64> {
        let mut summary = BTreeMap::new();
        for expense in self.expenses.read().values().filter(|e| e.user_id == user_id) {
            *summary.entry(expense.category.clone()).or_insert(0.0) += expense.amount;
        }
        summary
    }
}

impl Default for ExpenseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn expense(amount: f64, category: &str, day: &str) -> CreateExpense {
        CreateExpense {
            amount,
            category: category.to_string(),
            description: None,
            expense_date: date(day),
        }
    }

    #[test]
    fn test_create_and_find_is_owner_scoped() {
        let store = ExpenseStore::new();
        let created = store.create(1, expense(12.5, "food", "2024-03-01"));

        assert_eq!(store.find(1, created.id).unwrap().amount, 12.5);
        assert!(store.find(2, created.id).is_none());
    }

    #[test]
    fn test_partial_update() {
        let store = ExpenseStore::new();
        let created = store.create(1, expense(12.5, "food", "2024-03-01"));

        let updated = store
            .update(
                1,
                created.id,
                UpdateExpense {
                    amount: Some(20.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.amount, 20.0);
        assert_eq!(updated.category, "food");
        assert_eq!(updated.expense_date, date("2024-03-01"));

        assert!(store.update(2, created.id, UpdateExpense::default()).is_none());
    }

    #[test]
    fn test_delete_is_owner_scoped() {
        let store = ExpenseStore::new();
        let created = store.create(1, expense(5.0, "travel", "2024-03-01"));

        assert!(!store.delete(2, created.id));
        assert!(store.delete(1, created.id));
        assert!(!store.delete(1, created.id));
    }

    #[test]
    fn test_list_filters_sorts_and_pages() {
        let store = ExpenseStore::new();
        store.create(1, expense(1.0, "food", "2024-01-10"));
        store.create(1, expense(2.0, "food", "2024-02-10"));
        store.create(1, expense(3.0, "rent", "2024-02-01"));
        store.create(1, expense(4.0, "food", "2024-03-10"));
        store.create(2, expense(9.0, "food", "2024-02-15"));

        let all = store.list(1, &ExpenseFilter::default(), 0, 20);
        assert_eq!(all.total_elements, 4);
        let amounts: Vec<f64> = all.content.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![4.0, 2.0, 3.0, 1.0]);

        let food_in_feb = ExpenseFilter {
            category: Some("food".to_string()),
            start_date: Some(date("2024-02-01")),
            end_date: Some(date("2024-02-29")),
        };
        let page = store.list(1, &food_in_feb, 0, 20);
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].amount, 2.0);

        let second = store.list(1, &ExpenseFilter::default(), 1, 3);
        assert_eq!(second.total_pages, 2);
        assert_eq!(second.content.len(), 1);
        assert_eq!(second.content[0].amount, 1.0);
    }

    #[test]
    fn test_totals_are_owner_scoped() {
        let store = ExpenseStore::new();
        store.create(1, expense(1.5, "food", "2024-01-10"));
        store.create(1, expense(2.5, "food", "2024-02-10"));
        store.create(1, expense(10.0, "rent", "2024-02-01"));
        store.create(2, expense(99.0, "food", "2024-02-15"));

        assert_eq!(store.total(1), 14.0);
        assert_eq!(store.total(3), 0.0);

        let summary = store.category_summary(1);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["food"], 4.0);
        assert_eq!(summary["rent"], 10.0);
        assert!(store.category_summary(3).is_empty());
    }
}
