//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::middleware::TokenBucketLimiter;
use crate::models::{ExpenseStore, UserStore};
use crate::services::TokenAuthenticator;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Bearer token issuer/verifier.
    authenticator: TokenAuthenticator,

    /// Per-client token bucket limiter.
    rate_limiter: TokenBucketLimiter,

    /// Prometheus metrics.
    metrics: Metrics,

    /// Registered accounts.
    users: UserStore,

    /// Expense records.
    expenses: ExpenseStore,
}

impl AppState {
    /// Create new application state from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let authenticator = TokenAuthenticator::new(config.jwt_secret.as_bytes(), config.jwt_ttl)
            .context("failed to initialize token authenticator")?;

        let rate_limiter = TokenBucketLimiter::new(config.rate_limit)
            .context("failed to initialize rate limiter")?;

        info!(
            requests_per_window = config.rate_limit.requests_per_window,
            window_secs = config.rate_limit.window.as_secs(),
            "Rate limiter initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                authenticator,
                rate_limiter,
                metrics: Metrics::new(),
                users: UserStore::new(),
                expenses: ExpenseStore::new(),
            }),
        })
    }

    /// Get the token authenticator.
    pub fn authenticator(&self) -> &TokenAuthenticator {
        &self.inner.authenticator
    }

    /// Get the rate limiter.
    pub fn rate_limiter(&self) -> &TokenBucketLimiter {
        &self.inner.rate_limiter
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Get the user store.
    pub fn users(&self) -> &UserStore {
        &self.inner.users
    }

    /// Get the expense store.
    pub fn expenses(&self) -> &ExpenseStore {
        &self.inner.expenses
    }

    /// Periodically drop idle rate limit buckets until `shutdown` fires.
    ///
    /// Sweeps once per window, removing buckets idle longer than `max_idle`.
    pub async fn run_bucket_eviction(self, max_idle: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.rate_limiter().config().window);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let removed = self.rate_limiter().evict_idle(max_idle);
                    let remaining = self.rate_limiter().bucket_count();
                    self.metrics().set_bucket_count(remaining);
                    if removed > 0 {
                        debug!(removed, remaining, "evicted idle rate limit buckets");
                    }
                }
            }
        }

        info!("Rate limit eviction stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SECRET: &str = "state-test-secret-that-is-long-enough!";

    #[test]
    fn test_new_rejects_short_secret() {
        let config = Config::for_tests("short");
        assert!(AppState::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_eviction_task_stops_on_shutdown() {
        let state = AppState::new(&Config::for_tests(SECRET)).unwrap();
        state.rate_limiter().admit("ip:10.0.0.1");

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            state
                .clone()
                .run_bucket_eviction(Duration::from_secs(60), shutdown.clone()),
        );

        shutdown.cancel();
        task.await.unwrap();
    }
}
