//! User model and in-process account store.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

use crate::services::token::Role;

/// User record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub role: Role,
    pub created: DateTime<Utc>,
}

/// Input for creating a new user.
#[derive(Debug)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl User {
    /// Check a plaintext password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.pass) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Account store keyed by id, with a unique email index.
#[derive(Debug)]
pub struct UserStore {
    users: DashMap<u64, User>,
    by_email: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            by_email: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a user. Returns `Ok(None)` when the email is already registered.
    pub fn create(&self, input: CreateUser) -> Result<Option<User>> {
        let email = normalize_email(&input.email);
        let pass = hash_password(&input.password)?;

        // The vacant entry locks the email until the user is stored.
        let Entry::Vacant(slot) = self.by_email.entry(email.clone()) else {
            return Ok(None);
        };

        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: input.name.trim().to_string(),
            email,
            pass,
            role: input.role,
            created: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        slot.insert(user.id);

        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok(Some(user))
    }

    /// Find a user by ID.
    pub fn find_by_id(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    /// Find a user by email (case-insensitive).
    pub fn find_by_email(&self, email: &str) -> Option<User> {
        let id = *self.by_email.get(&normalize_email(email))?;
        self.find_by_id(id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
