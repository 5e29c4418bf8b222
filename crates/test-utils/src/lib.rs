//! Tally test utilities.
//!
//! Fixture builders and assertion helpers shared by integration tests.

use serde_json::{Value as JsonValue, json};

/// Create a test expense with default values.
pub fn test_expense(amount: f64, category: &str) -> TestExpense {
    TestExpense {
        amount,
        category: category.to_string(),
        description: None,
        expense_date: "2024-03-15".to_string(),
    }
}

/// A test expense builder for request bodies.
#[derive(Debug, Clone)]
pub struct TestExpense {
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: String,
}

impl TestExpense {
    /// Set the expense date (`YYYY-MM-DD`).
    pub fn on(mut self, date: &str) -> Self {
        self.expense_date = date.to_string();
        self
    }

    /// Set a description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Render as the JSON body accepted by `POST /expenses`.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "amount": self.amount,
            "category": self.category,
            "description": self.description,
            "expenseDate": self.expense_date,
        })
    }
}

/// Registration body for a throwaway account.
pub fn registration(name: &str, email: &str, password: &str) -> JsonValue {
    json!({ "name": name, "email": email, "password": password })
}

/// Login body.
pub fn credentials(email: &str, password: &str) -> JsonValue {
    json!({ "email": email, "password": password })
}

/// `Authorization` header value for a bearer token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Assertion helpers for JSON responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(
            actual,
            expected,
            "JSON mismatch:\nactual: {actual:#}\nexpected: {expected:#}"
        );
    }

    /// Assert that a JSON error body carries the given message.
    pub fn error_message(value: &Value, message: &str) {
        assert_eq!(
            value.get("message").and_then(Value::as_str),
            Some(message),
            "Unexpected error body: {value}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_builder() {
        let body = test_expense(12.5, "food")
            .on("2024-01-02")
            .with_description("lunch")
            .to_json();
        assert_eq!(body["expenseDate"], "2024-01-02");
        assert_eq!(body["description"], "lunch");
    }

    #[test]
    fn test_assert_helpers() {
        let value = json!({ "message": "Access denied" });
        assert::has_key(&value, "message");
        assert::error_message(&value, "Access denied");
        assert::json_eq(&value, &json!({ "message": "Access denied" }));
        assert_eq!(bearer("abc"), "Bearer abc");
    }
}
