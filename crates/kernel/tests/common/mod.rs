#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Each [`TestApp`] owns a fresh in-process state built from the REAL kernel
//! router, so tests never share rate limit buckets or accounts.

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tally_kernel::middleware::RateLimitConfig;
use tally_kernel::services::Role;
use tally_kernel::{AppState, Config, routes};

/// Signing secret used by every test app.
pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// App with the default quota (100 requests per 60 seconds).
    pub fn new() -> Self {
        Self::from_config(Config::for_tests(TEST_SECRET))
    }

    /// App with a custom quota.
    pub fn with_quota(requests_per_window: u32, window_secs: u64) -> Self {
        let mut config = Config::for_tests(TEST_SECRET);
        config.rate_limit = RateLimitConfig {
            requests_per_window,
            window: Duration::from_secs(window_secs),
        };
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Self {
        let state = AppState::new(&config).expect("failed to build test state");
        Self {
            router: routes::app(state.clone()),
            state,
        }
    }

    /// Send a request through the full middleware stack.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// GET `uri`, optionally with a bearer token.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, tally_test_utils::bearer(token));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Send a JSON body with `method` to `uri`, optionally with a bearer token.
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, tally_test_utils::bearer(token));
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Issue a token directly, skipping registration.
    pub fn token_for(&self, subject: u64, role: Role) -> String {
        self.state.authenticator().issue(subject, role).unwrap()
    }

    /// Register an account and log in, returning the bearer token.
    pub async fn register_and_login(&self, email: &str, password: &str) -> String {
        let response = self
            .send_json(
                "POST",
                "/auth/register",
                None,
                &tally_test_utils::registration("Test User", email, password),
            )
            .await;
        assert_eq!(response.status(), 201);

        let response = self
            .send_json(
                "POST",
                "/auth/login",
                None,
                &tally_test_utils::credentials(email, password),
            )
            .await;
        assert_eq!(response.status(), 200);
        response_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

/// Collect a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a header as a string, if present.
pub fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
