//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::user::{LoginRequest, LoginResponse, SignupRequest},
    AppState,
};

use super::AuthenticatedUser;

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Bad credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let response = state.services.users.login(request).await?;
    Ok(Json(response))
}

/// Register a student account
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = LoginResponse),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "Username already exists")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    let response = state.services.users.signup(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authenticated user", body = LoginResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoginResponse>> {
    let response = state.services.users.me(claims.user_id).await?;
    Ok(Json(response))
}
