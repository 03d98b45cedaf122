//! Request handlers.

pub mod admin;
pub mod auth;
pub mod health;
pub mod users;

use crate::error::AppError;

/// Fallback for unknown routes that passed admission.
pub async fn not_found() -> AppError {
    AppError::NotFound("Resource".into())
}
