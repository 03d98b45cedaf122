//! Profile and password handlers.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    ChangePasswordRequest, DataResponse, MessageResponse, UpdateProfileRequest, UserDto,
};
use crate::services::users;

/// `GET /api/users/profile`
pub async fn profile_handler(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<DataResponse<UserDto>>> {
    let user = users::profile(&state, &principal).await?;
    Ok(Json(DataResponse::ok(UserDto::from(&user))))
}

/// `PUT /api/users/profile`
pub async fn update_profile_handler(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    AppJson(body): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<DataResponse<UserDto>>> {
    let user = users::update_profile(&state, &principal, body).await?;
    Ok(Json(DataResponse::ok(UserDto::from(&user))))
}

/// `PUT /api/users/password`
pub async fn change_password_handler(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    users::change_password(&state, &principal, body).await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}
