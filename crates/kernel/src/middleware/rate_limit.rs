//! Per-client token bucket rate limiting.
//!
//! Every client key owns a bucket holding up to `requests_per_window` tokens
//! that refill continuously at `requests_per_window / window`. Buckets live
//! in a sharded concurrent map; the refill-then-consume step for a key runs
//! under that key's shard guard, so concurrent requests from one client are
//! serialized while other shards proceed untouched.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use axum::Json;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::services::token;
use crate::state::AppState;

/// Seconds advertised to rejected clients. Fixed, independent of the window.
pub const RETRY_AFTER_SECS: u64 = 60;

/// Message returned with every 429.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Response header carrying the tokens left after an admitted request.
pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";

/// Path prefixes that never consult the limiter (API docs and health).
pub const BYPASS_PREFIXES: &[&str] = &["/swagger-ui", "/v3/api-docs", "/health", "/error"];

/// Rate limit configuration shared by every bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Bucket capacity, and the number of tokens refilled per window.
    pub requests_per_window: u32,
    /// Time over which a drained bucket refills completely.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// One client's consumption state.
#[derive(Debug, Clone, Copy)]
pub struct RateBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Add the tokens accrued since the last refill, capped at `capacity`.
    ///
    /// An instant earlier than `last_refill` adds nothing and leaves
    /// `last_refill` where it is.
    fn refill(&mut self, capacity: f64, per_sec: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        self.tokens = (self.tokens + elapsed.as_secs_f64() * per_sec).min(capacity);
        self.last_refill = now;
    }

    /// Tokens currently available (may be fractional).
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmitResult {
    pub allowed: bool,
    /// Whole tokens left after this request (0 when rejected).
    pub remaining: u64,
}

/// Identity under which quota is tracked: `user:<hash>` or `ip:<address>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token bucket limiter keyed by client.
pub struct TokenBucketLimiter {
    buckets: DashMap<String, RateBucket>,
    config: RateLimitConfig,
    capacity: f64,
    refill_per_sec: f64,
}

impl TokenBucketLimiter {
    /// Create a limiter with an empty registry.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        if config.requests_per_window == 0 {
            bail!("requests per window must be positive");
        }
        if config.window.is_zero() {
            bail!("rate limit window must be positive");
        }

        let capacity = f64::from(config.requests_per_window);
        Ok(Self {
            buckets: DashMap::new(),
            config,
            capacity,
            refill_per_sec: capacity / config.window.as_secs_f64(),
        })
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Admit or reject one request for `key` at the current instant.
    pub fn admit(&self, key: &str) -> AdmitResult {
        self.admit_at(key, Instant::now())
    }

    /// Admit or reject one request for `key` at `now`.
    ///
    /// A previously unseen key starts with a full bucket.
    pub fn admit_at(&self, key: &str, now: Instant) -> AdmitResult {
        // The guard is held across refill and consume.
        let mut bucket = match self.buckets.get_mut(key) {
            Some(bucket) => bucket,
            None => self
                .buckets
                .entry(key.to_owned())
                .or_insert_with(|| RateBucket::full(self.capacity, now)),
        };

        bucket.refill(self.capacity, self.refill_per_sec, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            AdmitResult {
                allowed: true,
                remaining: bucket.tokens.floor() as u64,
            }
        } else {
            AdmitResult {
                allowed: false,
                remaining: 0,
            }
        }
    }

    /// Snapshot of a client's bucket, if one exists.
    pub fn bucket(&self, key: &str) -> Option<RateBucket> {
        self.buckets.get(key).map(|b| *b)
    }

    /// Number of tracked clients.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets untouched for longer than `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(max_idle, Instant::now())
    }

    /// Drop buckets untouched for longer than `max_idle` as of `now`.
    ///
    /// Returns the number of buckets removed. A bucket idle for at least one
    /// window is full, so evicting it is indistinguishable from keeping it.
    pub fn evict_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let keep = now.saturating_duration_since(bucket.last_refill) <= max_idle;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

impl fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("config", &self.config)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

/// Check whether a path is exempt from rate limiting.
pub fn is_bypassed(path: &str) -> bool {
    BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Derive the rate limit key for a request.
///
/// Requests carrying a bearer credential are keyed by a hash of the whole
/// `Authorization` header, so rotating a token starts a new bucket. Anything
/// else is keyed by client address: the first `X-Forwarded-For` entry when
/// it parses as an IP, otherwise the connection address.
pub fn client_key(headers: &HeaderMap, addr: Option<SocketAddr>) -> ClientKey {
    if token::extract(headers).is_some()
        && let Some(value) = headers.get(header::AUTHORIZATION)
    {
        return ClientKey(format!("user:{}", credential_hash(value.as_bytes())));
    }

    if let Some(ip) = forwarded_ip(headers) {
        return ClientKey(format!("ip:{ip}"));
    }

    let ip = addr
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    ClientKey(format!("ip:{ip}"))
}

/// Stable short hash of a credential header (first 8 bytes of SHA-256).
fn credential_hash(value: &[u8]) -> String {
    let digest = Sha256::digest(value);
    hex::encode(&digest[..8])
}

/// First `X-Forwarded-For` entry, if present and well formed.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get("x-forwarded-for")?;
    let Ok(value) = value.to_str() else {
        debug!("ignoring non-ASCII X-Forwarded-For header");
        return None;
    };

    let first = value.split(',').next().unwrap_or_default().trim();
    match first.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            debug!(forwarded = %first, "ignoring malformed X-Forwarded-For entry");
            None
        }
    }
}

/// Body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody {
    message: &'static str,
    retry_after_seconds: u64,
}

/// Rate limit exceeded response.
pub fn rate_limit_response() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
        Json(RateLimitBody {
            message: RATE_LIMIT_MESSAGE,
            retry_after_seconds: RETRY_AFTER_SECS,
        }),
    )
        .into_response()
}

/// Middleware admitting or rejecting each request against the client's bucket.
///
/// Runs before authentication: keying only needs the raw header, and
/// requests with bad credentials still spend quota.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_bypassed(request.uri().path()) {
        return next.run(request).await;
    }

    let addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), addr);

    let result = state.rate_limiter().admit(key.as_str());
    if !result.allowed {
        debug!(client = %key, "rate limit exceeded");
        state.metrics().record_rate_limit();
        return rate_limit_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(result.remaining));
    response
}
