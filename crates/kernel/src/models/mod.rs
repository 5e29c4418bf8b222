//! Data models.

pub mod expense;
pub mod user;

pub use expense::{CreateExpense, Expense, ExpenseFilter, ExpenseStore, Page, UpdateExpense};
pub use user::{CreateUser, User, UserStore};
