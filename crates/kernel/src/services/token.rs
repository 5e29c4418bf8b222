//! Bearer credential service.
//!
//! HS256 JWT signing and verification for the stateless access tokens handed
//! out at login. Verification is pure computation over the token and the
//! server secret: no shared state, no I/O.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::http::{HeaderMap, header};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted credential lifetime (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Authorization scheme prefix. Matched case-sensitively.
const BEARER_PREFIX: &str = "Bearer ";

/// Role carried in the `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(AuthError::Malformed),
        }
    }
}

/// Verified token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User identifier (always positive).
    pub subject: u64,
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub issued_at: i64,
    /// Expiration (Unix timestamp).
    pub expires_at: i64,
}

/// Reasons a presented credential is rejected.
///
/// All variants surface to the caller as the same 401; the variant is only
/// logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,
}

/// Claims as written into a token.
#[derive(Debug, Serialize)]
struct EncodedClaims<'a> {
    sub: String,
    role: &'a str,
    iat: i64,
    exp: i64,
}

/// Claims as read back from a token whose signature checked out.
///
/// Every field is optional so a missing claim is reported as
/// [`AuthError::Malformed`] rather than a deserialization failure.
#[derive(Debug, Deserialize)]
struct DecodedClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Read the bearer credential from request headers.
///
/// Returns `None` when the `Authorization` header is absent, not valid
/// visible ASCII, uses another scheme, or carries an empty token.
pub fn extract(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Issues and verifies bearer credentials.
#[derive(Clone)]
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenAuthenticator {
    /// Create an authenticator with HMAC-SHA256 signing.
    ///
    /// The secret must be at least [`MIN_SECRET_LEN`] bytes and the TTL
    /// between one second and [`MAX_TTL_SECS`].
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            bail!("JWT secret must be at least {MIN_SECRET_LEN} bytes");
        }
        if ttl.as_secs() == 0 {
            bail!("token TTL must be positive");
        }
        if ttl.as_secs() > MAX_TTL_SECS {
            bail!("token TTL must not exceed {MAX_TTL_SECS} seconds");
        }
        let ttl_secs = i64::try_from(ttl.as_secs()).context("token TTL out of range")?;

        // Expiry is checked by hand in `verify_at` so the clock can be injected.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        })
    }

    /// Configured credential lifetime in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign a new credential for a user, valid from now for the configured TTL.
    pub fn issue(&self, subject: u64, role: Role) -> Result<String> {
        self.issue_at(subject, role, chrono::Utc::now().timestamp())
    }

    /// Sign a new credential as if issued at `now` (Unix seconds).
    pub fn issue_at(&self, subject: u64, role: Role, now: i64) -> Result<String> {
        if subject == 0 {
            bail!("token subject must be a positive user id");
        }

        let exp = now
            .checked_add(self.ttl_secs)
            .context("token expiry out of range")?;
        let claims = EncodedClaims {
            sub: subject.to_string(),
            role: role.as_str(),
            iat: now,
            exp,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to encode access token")
    }

    /// Verify a credential against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify a credential against `now` (Unix seconds).
    ///
    /// Checks, in order: token structure and signature, expiry, then the
    /// presence and shape of subject and role.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let raw = jsonwebtoken::decode::<DecodedClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| classify(e.kind()))?
            .claims;

        let (Some(issued_at), Some(expires_at)) = (raw.iat, raw.exp) else {
            return Err(AuthError::Malformed);
        };
        if now > expires_at {
            return Err(AuthError::Expired);
        }

        let subject = raw
            .sub
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|id| *id > 0)
            .ok_or(AuthError::Malformed)?;
        let role = raw.role.as_deref().ok_or(AuthError::Malformed)?.parse()?;

        Ok(Claims {
            subject,
            role,
            issued_at,
            expires_at,
        })
    }
}

fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
    }
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}
