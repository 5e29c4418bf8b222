//! Kernel services.

pub mod token;

pub use token::{AuthError, Claims, Role, TokenAuthenticator};
