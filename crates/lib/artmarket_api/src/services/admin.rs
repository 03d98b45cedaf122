//! User moderation for administrators.

use artmarket_core::models::auth::{Principal, Role, UnknownRole};
use artmarket_core::models::user::{
    PageRequest, UnknownStatus, UserFilter, UserPage, UserRecord, UserStatus,
};
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{PageQuery, UpdateRoleRequest, UpdateStatusRequest};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Zero-based page of users, newest first, optionally narrowed to one role
/// and/or status. Blank filters are ignored.
pub async fn list_users(state: &AppState, query: PageQuery) -> AppResult<UserPage> {
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&size) {
        return Err(AppError::invalid_field(
            "size",
            format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    let page = PageRequest {
        page: query.page.unwrap_or(0),
        size,
    };
    let filter = UserFilter {
        role: non_blank(query.role.as_deref())
            .map(|r| r.parse::<Role>())
            .transpose()
            .map_err(|e| AppError::invalid_field("role", e.to_string()))?,
        status: non_blank(query.status.as_deref())
            .map(|s| s.parse::<UserStatus>())
            .transpose()
            .map_err(|e| AppError::invalid_field("status", e.to_string()))?,
    };
    state.directory_call(state.directory.list(page, filter)).await
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Set a user's moderation status. Takes effect on the user's next request.
pub async fn set_status(
    state: &AppState,
    admin: &Principal,
    user_id: &str,
    req: UpdateStatusRequest,
) -> AppResult<UserRecord> {
    let status: UserStatus = req
        .status
        .parse()
        .map_err(|e: UnknownStatus| {
            AppError::invalid_field("status", e.to_string())
        })?;

    let user = state
        .directory_call(state.directory.set_status(user_id, status))
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

    info!(admin = %admin.subject, subject = %user.id, status = %status, "user status changed");
    Ok(user)
}

/// Set a user's stored role. Tokens already issued keep their role.
pub async fn set_role(
    state: &AppState,
    admin: &Principal,
    user_id: &str,
    req: UpdateRoleRequest,
) -> AppResult<UserRecord> {
    let role: Role = req
        .role
        .parse()
        .map_err(|e: UnknownRole| {
            AppError::invalid_field("role", e.to_string())
        })?;

    let user = state
        .directory_call(state.directory.set_role(user_id, role))
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

    info!(admin = %admin.subject, subject = %user.id, role = %role, "user role changed");
    Ok(user)
}
