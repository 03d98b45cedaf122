//! Self-service account operations for the authenticated user.

use std::collections::BTreeMap;

use artmarket_core::auth::password::password_policy_violations;
use artmarket_core::models::auth::Principal;
use artmarket_core::models::user::{ProfileUpdate, UserRecord};
use tracing::info;

use super::{check_name, validated};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{ChangePasswordRequest, UpdateProfileRequest};

async fn current_user(state: &AppState, principal: &Principal) -> AppResult<UserRecord> {
    state
        .directory_call(state.directory.load(&principal.subject))
        .await?
        .ok_or(AppError::UserMissingOrInactive)
}

/// The caller's own profile.
pub async fn profile(state: &AppState, principal: &Principal) -> AppResult<UserRecord> {
    current_user(state, principal).await
}

/// Update first and/or last name. Absent fields are left unchanged.
pub async fn update_profile(
    state: &AppState,
    principal: &Principal,
    req: UpdateProfileRequest,
) -> AppResult<UserRecord> {
    let mut fields = BTreeMap::new();
    if let Some(first) = &req.first_name {
        check_name(&mut fields, "firstName", "First name", first);
    }
    if let Some(last) = &req.last_name {
        check_name(&mut fields, "lastName", "Last name", last);
    }
    validated(fields)?;

    let update = ProfileUpdate {
        first_name: req.first_name.map(|n| n.trim().to_string()),
        last_name: req.last_name.map(|n| n.trim().to_string()),
    };
    state
        .directory_call(state.directory.update_profile(&principal.subject, update))
        .await?
        .ok_or(AppError::UserMissingOrInactive)
}

/// Replace the caller's password after checking the current one.
pub async fn change_password(
    state: &AppState,
    principal: &Principal,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    let mut fields = BTreeMap::new();
    if req.current_password.is_empty() {
        fields.insert(
            "currentPassword".to_string(),
            "Current password is required".to_string(),
        );
    }
    if req.new_password.is_empty() {
        fields.insert(
            "newPassword".to_string(),
            "New password is required".to_string(),
        );
    }
    validated(fields)?;

    let user = current_user(state, principal).await?;
    if !state
        .passwords
        .verify(&req.current_password, &user.password_hash)
        .await?
    {
        return Err(AppError::InvalidCredentials);
    }

    let violations = password_policy_violations(&req.new_password);
    if !violations.is_empty() {
        return Err(AppError::WeakPassword(violations));
    }

    let password_hash = state.passwords.hash(&req.new_password).await?;
    let updated = state
        .directory_call(state.directory.update_password(&user.id, &password_hash))
        .await?;
    if !updated {
        return Err(AppError::UserMissingOrInactive);
    }

    info!(subject = %user.id, "password changed");
    Ok(())
}
