//! Application error types.
//!
//! Every failure leaving the API is one of the [`AppError`] kinds. Responses
//! carry an [`ErrorBody`] both as JSON and as a response extension; the
//! error-envelope middleware stamps the request path onto it.

use std::collections::BTreeMap;

use artmarket_core::auth::AuthError;
use artmarket_core::directory::DirectoryError;
use artmarket_core::ownership::OwnershipError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token revoked")]
    TokenRevoked,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("user missing or inactive")]
    UserMissingOrInactive,

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("weak password: {0:?}")]
    WeakPassword(Vec<String>),

    #[error("validation failed: {0:?}")]
    Validation(BTreeMap<String, String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.into());
        AppError::Validation(fields)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidToken
            | AppError::TokenRevoked
            | AppError::InvalidRefreshToken
            | AppError::UserMissingOrInactive
            | AppError::Unauthenticated
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::WeakPassword(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Never includes internal detail.
    fn message(&self) -> String {
        match self {
            AppError::InvalidToken => "Invalid or expired token".into(),
            AppError::TokenRevoked => "Token has been revoked".into(),
            AppError::InvalidRefreshToken => "Invalid refresh token".into(),
            AppError::UserMissingOrInactive => "User account is unavailable".into(),
            AppError::Unauthenticated => "Authentication required".into(),
            AppError::Forbidden => "You don't have permission to access this resource".into(),
            AppError::RateLimited { .. } => "Too many requests. Please try again later.".into(),
            AppError::InvalidCredentials => "Invalid credentials".into(),
            AppError::EmailTaken => "Email already registered".into(),
            AppError::WeakPassword(_) => "Password does not meet the policy".into(),
            AppError::Validation(_) => "Validation failed for request parameters".into(),
            AppError::NotFound(what) => format!("{what} not found"),
            AppError::Unavailable(_) => "Service temporarily unavailable".into(),
            AppError::Internal(_) => "Internal server error".into(),
        }
    }

    fn error_label(status: StatusCode) -> &'static str {
        match status {
            StatusCode::BAD_REQUEST => "Validation Error",
            other => other.canonical_reason().unwrap_or("Error"),
        }
    }
}

/// JSON error body shared by every error response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(detail) => error!(error = %detail, "request failed"),
            AppError::Unavailable(detail) => warn!(error = %detail, "dependency unavailable"),
            _ => {}
        }

        let mut body = ErrorBody {
            success: false,
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: Self::error_label(status).to_string(),
            message: self.message(),
            path: None,
            validation_errors: None,
            violations: None,
            retry_after: None,
        };
        let mut retry_header = None;
        match self {
            AppError::Validation(fields) => body.validation_errors = Some(fields),
            AppError::WeakPassword(rules) => {
                let mut fields = BTreeMap::new();
                fields.insert("password".to_string(), rules.join("; "));
                body.validation_errors = Some(fields);
                body.violations = Some(rules);
            }
            AppError::RateLimited { retry_after_secs } => {
                body.retry_after = Some(retry_after_secs);
                retry_header = Some(retry_after_secs);
            }
            _ => {}
        }

        let mut response = (status, Json(body.clone())).into_response();
        if let Some(secs) = retry_header {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response.extensions_mut().insert(body);
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken => AppError::InvalidToken,
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::UnknownRole(role) => {
                AppError::invalid_field("role", format!("Unknown role: {role}"))
            }
            AuthError::KeyConfig(msg) | AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Unavailable(e.to_string())
            }
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::EmailTaken => AppError::EmailTaken,
            DirectoryError::DbError(e) => AppError::from(e),
            DirectoryError::CorruptRow(msg) => AppError::Internal(msg),
        }
    }
}

impl From<OwnershipError> for AppError {
    fn from(e: OwnershipError) -> Self {
        AppError::Unavailable(format!("ownership lookup: {e}"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::invalid_field("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::invalid_field("query", rejection.body_text())
    }
}
