//! Administrator handlers. The policy gate restricts `/api/admin/**` to
//! administrators before these run.

use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{AppJson, AppQuery};
use crate::metrics::AdmissionSnapshot;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    DataResponse, PageQuery, UpdateRoleRequest, UpdateStatusRequest, UserDto, UserPageDto,
};
use crate::services::admin;

/// `GET /api/admin/users?page=&size=&role=&status=`
pub async fn list_users_handler(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<DataResponse<UserPageDto>>> {
    let page = admin::list_users(&state, query).await?;
    Ok(Json(DataResponse::ok(UserPageDto::from(&page))))
}

/// `PUT /api/admin/users/{id}/status`
pub async fn set_status_handler(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<UpdateStatusRequest>,
) -> AppResult<Json<DataResponse<UserDto>>> {
    let user = admin::set_status(&state, &principal, &id, body).await?;
    Ok(Json(DataResponse::ok(UserDto::from(&user))))
}

/// `PUT /api/admin/users/{id}/role`
pub async fn set_role_handler(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<UpdateRoleRequest>,
) -> AppResult<Json<DataResponse<UserDto>>> {
    let user = admin::set_role(&state, &principal, &id, body).await?;
    Ok(Json(DataResponse::ok(UserDto::from(&user))))
}

/// `GET /api/admin/access-metrics`
pub async fn access_metrics_handler(
    State(state): State<AppState>,
) -> Json<DataResponse<AdmissionSnapshot>> {
    Json(DataResponse::ok(state.metrics.snapshot()))
}
