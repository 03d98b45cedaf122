//! Route authorization against the frozen policy table.

use artmarket_core::models::auth::Principal;
use artmarket_core::ownership::{may_act_on, resolve_owner};
use artmarket_core::policy::{OwnershipCheck, PolicyDecision};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;

/// Axum middleware: allow, 401 or 403 by route, role and ownership.
pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|AuthenticatedUser(p)| p.clone());

    let decision = state
        .policy
        .evaluate(request.method(), request.uri().path(), principal.as_ref());

    match (decision, principal) {
        (PolicyDecision::MalformedPath, _) => {
            debug!(method = %request.method(), path = %request.uri().path(), "malformed request path");
            return Err(AppError::invalid_field("path", "Malformed request path"));
        }
        (PolicyDecision::DenyAnonymous, _) | (PolicyDecision::Allow { ownership: Some(_) }, None) => {
            state.metrics.record_denied_anonymous();
            debug!(method = %request.method(), path = %request.uri().path(), "authentication required");
            return Err(AppError::Unauthenticated);
        }
        (PolicyDecision::DenyRole, principal) => {
            state.metrics.record_denied_role();
            debug!(
                method = %request.method(),
                path = %request.uri().path(),
                role = ?principal.map(|p| p.role),
                "role not permitted"
            );
            return Err(AppError::Forbidden);
        }
        (PolicyDecision::Allow { ownership: Some(check) }, Some(principal)) => {
            check_ownership(&state, &principal, &check).await?;
        }
        (PolicyDecision::Allow { ownership: None }, _) => {}
    }

    Ok(next.run(request).await)
}

/// A missing resource passes; the handler answers 404.
async fn check_ownership(
    state: &AppState,
    principal: &Principal,
    check: &OwnershipCheck,
) -> Result<(), AppError> {
    let lookup = resolve_owner(state.owners.as_ref(), check.resource, &check.resource_id);
    let owner = match tokio::time::timeout(state.config.io_timeout, lookup).await {
        Ok(owner) => owner?,
        Err(_) => {
            warn!(resource = %check.resource, id = %check.resource_id, "ownership lookup timed out");
            return Err(AppError::Unavailable("ownership lookup timed out".into()));
        }
    };

    match owner {
        Some(owner) if !may_act_on(principal, &owner) => {
            state.metrics.record_denied_ownership();
            debug!(
                subject = %principal.subject,
                resource = %check.resource,
                id = %check.resource_id,
                "not the owner"
            );
            Err(AppError::Forbidden)
        }
        _ => Ok(()),
    }
}
