//! Tally Kernel Library
//!
//! Expense tracking API behind a request-admission pipeline: per-client
//! token bucket rate limiting followed by bearer token authentication.
//! The `tally` binary wires this library into a running server.

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use state::AppState;
