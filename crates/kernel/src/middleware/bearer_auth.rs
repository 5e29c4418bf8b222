//! Bearer token authentication middleware.
//!
//! Checks `Authorization: Bearer <token>` headers, verifies the JWT, and
//! attaches the caller's identity to the request for downstream handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Method, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::{AppError, AppResult, ErrorBody};
use crate::middleware::rate_limit::is_bypassed;
use crate::services::token::{self, Role};
use crate::state::AppState;

/// Routes reachable without a credential.
const PUBLIC_ROUTES: &[(&str, &str)] = &[
    ("POST", "/auth/register"),
    ("POST", "/auth/login"),
    ("GET", "/metrics"),
];

/// Check whether a route may be called anonymously.
pub fn is_public(method: &Method, path: &str) -> bool {
    PUBLIC_ROUTES
        .iter()
        .any(|(m, p)| *m == method.as_str() && *p == path)
}

/// Middleware to authenticate Bearer JWT tokens.
///
/// A valid token sets [`CurrentUser`] in request extensions. A present but
/// invalid token is rejected with 401. A missing token is only accepted on
/// public routes; docs and health paths skip this layer entirely.
pub async fn authenticate_bearer_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_bypassed(path) {
        return next.run(request).await;
    }

    let verified = token::extract(request.headers()).map(|t| state.authenticator().verify(t));

    match verified {
        Some(Ok(claims)) => {
            request.extensions_mut().insert(CurrentUser {
                user_id: claims.subject,
                role: claims.role,
            });
            next.run(request).await
        }
        Some(Err(e)) => {
            debug!(error = %e, path = %request.uri().path(), "invalid bearer token");
            state.metrics().record_auth_failure();
            invalid_token_response()
        }
        None if is_public(request.method(), request.uri().path()) => next.run(request).await,
        None => {
            state.metrics().record_auth_failure();
            AppError::Unauthorized.into_response()
        }
    }
}

/// 401 for a credential that failed verification. The reason is not disclosed.
fn invalid_token_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
        Json(ErrorBody::new("Invalid or expired token")),
    )
        .into_response()
}

/// Identity established from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: u64,
    pub role: Role,
}

impl CurrentUser {
    /// Require the caller to hold `role`. Admins satisfy every role.
    pub fn require_role(&self, role: Role) -> AppResult<()> {
        if self.role == role || self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        assert!(is_public(&Method::POST, "/auth/login"));
        assert!(is_public(&Method::POST, "/auth/register"));
        assert!(is_public(&Method::GET, "/metrics"));
        assert!(!is_public(&Method::GET, "/auth/login"));
        assert!(!is_public(&Method::GET, "/expenses"));
    }

    #[test]
    fn test_require_role() {
        let user = CurrentUser {
            user_id: 1,
            role: Role::User,
        };
        let admin = CurrentUser {
            user_id: 2,
            role: Role::Admin,
        };

        assert!(user.require_role(Role::User).is_ok());
        assert!(matches!(
            user.require_role(Role::Admin),
            Err(AppError::Forbidden)
        ));
        assert!(admin.require_role(Role::Admin).is_ok());
        assert!(admin.require_role(Role::User).is_ok());
    }
}
