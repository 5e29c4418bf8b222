//! Account registration and token login.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::CreateUser;
use crate::services::Role;
use crate::state::AppState;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest("A valid email is required".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Register a new account. New accounts always get the USER role.
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<StatusCode> {
    request.validate()?;

    let created = state.users().create(CreateUser {
        name: request.name,
        email: request.email,
        password: request.password,
        role: Role::User,
    })?;

    match created {
        Some(_) => Ok(StatusCode::CREATED),
        None => Err(AppError::Conflict("Email already registered".to_string())),
    }
}

/// Exchange credentials for a bearer token.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let Some(user) = state.users().find_by_email(&request.email) else {
        debug!("login for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !user.verify_password(&request.password) {
        debug!(user_id = user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let authenticator = state.authenticator();
    let token = authenticator.issue(user.id, user.role)?;
    info!(user_id = user.id, "user logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: authenticator.ttl_secs(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(request("Ada", "ada@example.com", "longenough").validate().is_ok());
        assert!(request(" ", "ada@example.com", "longenough").validate().is_err());
        assert!(request("Ada", "not-an-email", "longenough").validate().is_err());
        assert!(request("Ada", "ada@example.com", "short").validate().is_err());
    }

    #[test]
    fn test_login_response_shape() {
        let json = serde_json::to_value(LoginResponse {
            token: "abc".to_string(),
            token_type: "Bearer",
            expires_in: 900,
        })
        .unwrap();
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["expiresIn"], 900);
    }
}
