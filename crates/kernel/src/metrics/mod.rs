//! Prometheus metrics collection.
//!
//! Provides application metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// HTTP request counter by method/path/status.
    pub http_requests: Family<HttpLabels, Counter>,

    /// HTTP request duration histogram.
    pub http_duration_seconds: Family<HttpLabels, Histogram>,

    /// Rate limit rejections counter.
    pub rate_limit_rejections: Counter,

    /// Missing or invalid credentials on protected routes.
    pub auth_failures: Counter,

    /// Clients currently tracked by the rate limiter.
    pub rate_limit_buckets: Gauge,
}

impl Metrics {
    /// Create a new metrics registry.
    ///
    /// Counters are registered without the `_total` suffix; the text
    /// encoder appends it.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total HTTP requests",
            http_requests.clone(),
        );

        let http_duration_seconds = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_duration_seconds.clone(),
        );

        let rate_limit_rejections = Counter::default();
        registry.register(
            "rate_limit_rejections",
            "Rate limit rejections",
            rate_limit_rejections.clone(),
        );

        let auth_failures = Counter::default();
        registry.register(
            "auth_failures",
            "Requests rejected for missing or invalid credentials",
            auth_failures.clone(),
        );

        let rate_limit_buckets = Gauge::default();
        registry.register(
            "rate_limit_buckets",
            "Clients tracked by the rate limiter",
            rate_limit_buckets.clone(),
        );

        Self {
            registry,
            http_requests,
            http_duration_seconds,
            rate_limit_rejections,
            auth_failures,
            rate_limit_buckets,
        }
    }

    /// Record an HTTP request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests.get_or_create(&labels).inc();
        self.http_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a rate limit rejection.
    pub fn record_rate_limit(&self) {
        self.rate_limit_rejections.inc();
    }

    /// Record a rejected credential.
    pub fn record_auth_failure(&self) {
        self.auth_failures.inc();
    }

    /// Update the tracked client gauge.
    pub fn set_bucket_count(&self, count: usize) {
        self.rate_limit_buckets
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible, and all metric
    /// labels use derived `EncodeLabelSet` impls that do not produce
    /// `fmt::Error`.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

/// Normalize a path for metrics labels.
///
/// Replaces numeric IDs with a placeholder to limit cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|s| {
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/expenses/123"), "/expenses/{id}");
        assert_eq!(normalize_path("/admin/rate-limit"), "/admin/rate-limit");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        let output = metrics.encode();
        assert!(output.contains("# TYPE http_requests counter"));
        assert!(output.contains("rate_limit_rejections_total"));
        assert!(output.contains("auth_failures_total"));
    }

    #[test]
    fn test_record_rate_limit() {
        let metrics = Metrics::new();
        metrics.record_rate_limit();
        metrics.record_rate_limit();
        assert_eq!(metrics.rate_limit_rejections.get(), 2);
    }

    #[test]
    fn test_bucket_gauge() {
        let metrics = Metrics::new();
        metrics.set_bucket_count(7);
        assert_eq!(metrics.rate_limit_buckets.get(), 7);
    }

    #[test]
    fn test_record_request() {
        let metrics = Metrics::new();
        metrics.record_request("GET", "/expenses/123", 200, 0.05);

        let output = metrics.encode();
        assert!(output.contains("/expenses/{id}"));
    }
}
