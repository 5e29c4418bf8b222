//! HTTP middleware components.
//!
//! Request admission (rate limiting, bearer authentication) and metrics
//! collection layers.

pub mod bearer_auth;
pub mod metrics;
pub mod rate_limit;

pub use bearer_auth::{CurrentUser, authenticate_bearer_token};
pub use metrics::track_metrics;
pub use rate_limit::{
    AdmitResult, ClientKey, RateLimitConfig, TokenBucketLimiter, client_key, enforce_rate_limit,
    rate_limit_response,
};
