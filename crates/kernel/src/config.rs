//! Configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::middleware::RateLimitConfig;
use crate::services::token::{MAX_TTL_SECS, MIN_SECRET_LEN};

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port (default: 8080).
    pub port: u16,

    /// HMAC secret for signing bearer tokens (at least 32 bytes).
    pub jwt_secret: String,

    /// Bearer token lifetime (default: 15 minutes).
    pub jwt_ttl: Duration,

    /// Per-client quota (default: 100 requests per 60 seconds).
    pub rate_limit: RateLimitConfig,

    /// Evict rate limit buckets idle for this many windows. 0 disables the sweep.
    pub rate_limit_evict_after_windows: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = parse_var("PORT", 8080u16)?;

        let jwt_secret =
            env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let jwt_ttl_secs = parse_var("JWT_TTL_SECS", 900u64)?;
        if jwt_ttl_secs == 0 || jwt_ttl_secs > MAX_TTL_SECS {
            bail!("JWT_TTL_SECS must be between 1 and {MAX_TTL_SECS}");
        }
        let jwt_ttl = Duration::from_secs(jwt_ttl_secs);

        let requests_per_window = parse_var("RATE_LIMIT_REQUESTS_PER_WINDOW", 100u32)?;
        let window_secs = parse_var("RATE_LIMIT_WINDOW_SECS", 60u64)?;
        if requests_per_window == 0 || window_secs == 0 {
            bail!("RATE_LIMIT_REQUESTS_PER_WINDOW and RATE_LIMIT_WINDOW_SECS must be positive");
        }

        let rate_limit_evict_after_windows = parse_var("RATE_LIMIT_EVICT_AFTER_WINDOWS", 0u32)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            jwt_secret,
            jwt_ttl,
            rate_limit: RateLimitConfig {
                requests_per_window,
                window: Duration::from_secs(window_secs),
            },
            rate_limit_evict_after_windows,
            cors_allowed_origins,
        })
    }

    /// Defaults with the given secret, without reading the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            port: 0,
            jwt_secret: jwt_secret.to_string(),
            jwt_ttl: Duration::from_secs(900),
            rate_limit: RateLimitConfig::default(),
            rate_limit_evict_after_windows: 0,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }

    /// Idle threshold for the eviction sweep, if enabled.
    pub fn eviction_threshold(&self) -> Option<Duration> {
        (self.rate_limit_evict_after_windows > 0)
            .then(|| self.rate_limit.window * self.rate_limit_evict_after_windows)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl", &self.jwt_ttl)
            .field("rate_limit", &self.rate_limit)
            .field(
                "rate_limit_evict_after_windows",
                &self.rate_limit_evict_after_windows,
            )
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_tests_defaults() {
        let config = Config::for_tests("x".repeat(32).as_str());
        assert_eq!(config.rate_limit.requests_per_window, 100);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.jwt_ttl, Duration::from_secs(900));
        assert!(config.eviction_threshold().is_none());
    }

    #[test]
    fn test_eviction_threshold() {
        let mut config = Config::for_tests("x".repeat(32).as_str());
        config.rate_limit_evict_after_windows = 5;
        assert_eq!(config.eviction_threshold(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::for_tests("super-secret-value-that-is-32-bytes!");
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
    }
}
