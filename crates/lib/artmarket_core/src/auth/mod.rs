//! Credential handling.
//!
//! Signing keys, token minting and verification, password hashing and the
//! password policy. Shared by the admission middleware and the auth service.

pub mod password;
pub mod token;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, badly signed or expired token. Carries no detail.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Key configuration error: {0}")]
    KeyConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
