//! Authentication service: register, login, refresh, logout.

use std::collections::BTreeMap;
use std::time::Duration;

use artmarket_core::auth::password::password_policy_violations;
use artmarket_core::auth::token::{fingerprint, remaining_ttl};
use artmarket_core::models::auth::{Role, TokenKind};
use artmarket_core::models::user::{NewUser, UserRecord, normalize_email};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{check_name, validated};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    AccessTokenData, AuthResponse, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
    TokenPair, UserDto,
};

/// Denylist entries outlive the token by this margin.
const REVOCATION_MARGIN: Duration = Duration::from_secs(1);

fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

// ---------------------------------------------------------------------------
// Session issuance
// ---------------------------------------------------------------------------

/// Mint an access/refresh pair for `user` and build the auth response.
fn issue_session(state: &AppState, user: &UserRecord, message: &str) -> AppResult<AuthResponse> {
    let access = state
        .tokens
        .mint_for(&user.id, &user.email, user.role, TokenKind::Access)?;
    let refresh = state
        .tokens
        .mint_for(&user.id, &user.email, user.role, TokenKind::Refresh)?;

    Ok(AuthResponse {
        success: true,
        message: message.to_string(),
        user: UserDto::from(user),
        tokens: TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: state.tokens.keys().ttl(TokenKind::Access).num_seconds(),
        },
        redirect_url: user.role.dashboard_path().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Public auth operations
// ---------------------------------------------------------------------------

/// Create an account and open a session for it.
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email);
    let mut fields = BTreeMap::new();

    if email.is_empty() {
        fields.insert("email".to_string(), "Email is required".to_string());
    } else if !is_valid_email(&email) {
        fields.insert("email".to_string(), "Email should be valid".to_string());
    }
    check_name(&mut fields, "firstName", "First name", &req.first_name);
    check_name(&mut fields, "lastName", "Last name", &req.last_name);

    let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => Role::Customer,
        Some(raw) => match raw.parse::<Role>() {
            Ok(Role::Admin) => {
                fields.insert(
                    "role".to_string(),
                    "Administrator accounts cannot be self-registered".to_string(),
                );
                Role::Admin
            }
            Ok(role) => role,
            Err(e) => {
                fields.insert("role".to_string(), e.to_string());
                Role::Customer
            }
        },
    };
    validated(fields)?;

    let violations = password_policy_violations(&req.password);
    if !violations.is_empty() {
        return Err(AppError::WeakPassword(violations));
    }

    if state
        .directory_call(state.directory.find_by_email(&email))
        .await?
        .is_some()
    {
        return Err(AppError::EmailTaken);
    }

    let password_hash = state.passwords.hash(&req.password).await?;
    // the unique index catches a concurrent registration
    let user = state
        .directory_call(state.directory.create(NewUser {
            email,
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role,
        }))
        .await?;

    info!(subject = %user.id, role = %user.role, "user registered");
    issue_session(state, &user, "User registered successfully")
}

/// Authenticate with email and password.
///
/// Unknown emails are checked against a dummy hash so both failure paths
/// cost one bcrypt comparison.
pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email);
    let mut fields = BTreeMap::new();
    if email.is_empty() {
        fields.insert("email".to_string(), "Email is required".to_string());
    }
    if req.password.is_empty() {
        fields.insert("password".to_string(), "Password is required".to_string());
    }
    validated(fields)?;

    let user = state
        .directory_call(state.directory.find_by_email(&email))
        .await?;
    let matched = state
        .passwords
        .verify_or_dummy(&req.password, user.as_ref().map(|u| u.password_hash.as_str()))
        .await?;

    match user {
        Some(user) if matched && user.is_enabled() => {
            info!(subject = %user.id, "login succeeded");
            issue_session(state, &user, "Login successful")
        }
        Some(user) if matched => {
            debug!(subject = %user.id, status = %user.status, "login refused for disabled user");
            Err(AppError::InvalidCredentials)
        }
        _ => {
            debug!("login failed");
            Err(AppError::InvalidCredentials)
        }
    }
}

/// Exchange a refresh token for a new access token.
///
/// The refresh token itself is not rotated.
pub async fn refresh(state: &AppState, req: RefreshRequest) -> AppResult<AccessTokenData> {
    let token = req.refresh_token.trim();
    let claims = state
        .tokens
        .verify(token)
        .map_err(|_| AppError::InvalidRefreshToken)?;

    match state.denylist.is_revoked(token).await {
        Ok(false) => {}
        Ok(true) => {
            debug!(token = %fingerprint(token), "revoked refresh token presented");
            return Err(AppError::InvalidRefreshToken);
        }
        Err(e) => {
            state.metrics.record_denylist_unavailable();
            warn!(
                token = %fingerprint(token),
                error = %e,
                "denylist unavailable, treating refresh token as not revoked"
            );
        }
    }

    match state.directory_call(state.directory.load(&claims.sub)).await? {
        Some(user) if user.is_enabled() => {}
        _ => return Err(AppError::InvalidRefreshToken),
    }

    let role = claims
        .parsed_role()
        .map_err(|_| AppError::InvalidRefreshToken)?;
    let access = state
        .tokens
        .mint_for(&claims.sub, &claims.email, role, TokenKind::Access)?;

    debug!(subject = %claims.sub, "access token refreshed");
    Ok(AccessTokenData {
        access_token: access.token,
    })
}

/// Revoke the bearer and refresh tokens. Never fails.
///
/// Tokens that do not verify are skipped; they are already unusable.
pub async fn logout(state: &AppState, bearer: Option<&str>, req: LogoutRequest) {
    let refresh = req.refresh_token.as_deref().map(str::trim);
    for token in bearer.into_iter().chain(refresh) {
        revoke_quietly(state, token).await;
    }
}

async fn revoke_quietly(state: &AppState, token: &str) {
    let Ok(claims) = state.tokens.verify(token) else {
        debug!(token = %fingerprint(token), "skipping revocation of unusable token");
        return;
    };
    let Some(remaining) = remaining_ttl(&claims, Utc::now()) else {
        return;
    };

    match state.denylist.revoke(token, remaining + REVOCATION_MARGIN).await {
        Ok(()) => debug!(subject = %claims.sub, token = %fingerprint(token), "token revoked"),
        Err(e) => {
            state.metrics.record_revocation_unavailable();
            warn!(
                subject = %claims.sub,
                token = %fingerprint(token),
                error = %e,
                "token revocation unavailable"
            );
        }
    }
}
