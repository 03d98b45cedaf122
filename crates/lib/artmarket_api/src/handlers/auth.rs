//! Authentication request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::{AuthenticatedUser, bearer_token};
use crate::models::{
    AccessTokenData, AuthResponse, DataResponse, LoginRequest, LogoutRequest, MessageResponse,
    RefreshRequest, RegisterRequest, UserDto,
};
use crate::services::{auth, users};

/// `POST /api/auth/register`: create an account.
pub async fn register_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let resp = auth::register(&state, body).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let resp = auth::login(&state, body).await?;
    Ok(Json(resp))
}

/// `POST /api/auth/refresh`: mint a new access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<RefreshRequest>,
) -> AppResult<Json<DataResponse<AccessTokenData>>> {
    let resp = auth::refresh(&state, body).await?;
    Ok(Json(DataResponse::ok(resp)))
}

/// `POST /api/auth/logout`: revoke the bearer and refresh tokens.
///
/// Any body is accepted; an unreadable one just carries no refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<MessageResponse> {
    let req: LogoutRequest = serde_json::from_slice(&body).unwrap_or_default();
    auth::logout(&state, bearer_token(&headers), req).await;
    Json(MessageResponse::ok("Logged out successfully"))
}

/// `GET /api/auth/verify`: profile of the authenticated caller.
pub async fn verify_handler(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<DataResponse<UserDto>>> {
    let user = users::profile(&state, &principal).await?;
    Ok(Json(DataResponse::ok(UserDto::from(&user))))
}
