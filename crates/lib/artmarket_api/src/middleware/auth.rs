//! Authentication middleware: bearer extraction, token verification,
//! revocation check and principal attachment.

use artmarket_core::auth::token::fingerprint;
use artmarket_core::models::auth::Principal;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::AppState;
use crate::error::AppError;

/// The principal attached to a request by [`authenticate`].
///
/// Extracting it on a request without one yields
/// [`AppError::Unauthenticated`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// The token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum middleware: resolves the bearer token to a [`Principal`].
///
/// Requests without a usable token continue anonymously; the policy gate
/// decides whether that is enough. A revoked token, or one whose user is
/// gone or disabled, stops the request with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let consumes_credentials = state
        .policy
        .resolve(request.method(), request.uri().path())
        .is_some_and(|row| row.consumes_credentials());

    // logout reads the header itself and must stay idempotent
    let token = bearer_token(request.headers())
        .filter(|_| !consumes_credentials)
        .map(str::to_owned);

    if let Some(token) = token
        && let Some(principal) = identify(&state, &token).await?
    {
        request.extensions_mut().insert(AuthenticatedUser(principal));
    }

    Ok(next.run(request).await)
}

async fn identify(state: &AppState, token: &str) -> Result<Option<Principal>, AppError> {
    let Ok(claims) = state.tokens.verify(token) else {
        return Ok(None);
    };

    match state.denylist.is_revoked(token).await {
        Ok(false) => {}
        Ok(true) => {
            debug!(token = %fingerprint(token), "revoked token presented");
            return Err(AppError::TokenRevoked);
        }
        Err(e) => {
            state.metrics.record_denylist_unavailable();
            warn!(
                token = %fingerprint(token),
                error = %e,
                "denylist unavailable, treating token as not revoked"
            );
        }
    }

    let user = match state.directory_call(state.directory.load(&claims.sub)).await {
        Ok(Some(user)) if user.is_enabled() => user,
        Ok(_) => {
            debug!(subject = %claims.sub, "token subject missing or disabled");
            return Err(AppError::UserMissingOrInactive);
        }
        Err(e) => {
            warn!(subject = %claims.sub, error = %e, "could not load token subject");
            return Err(AppError::UserMissingOrInactive);
        }
    };

    let principal = Principal::from_claims(&claims, &user).map_err(|_| AppError::InvalidToken)?;
    Ok(Some(principal))
}
