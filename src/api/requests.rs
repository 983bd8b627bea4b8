//! Borrow request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::borrow_request::{
        BorrowRequest, CreateBorrowRequest, DecisionAction, DecisionInput, RequestListQuery,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List borrow requests. Students get their own; staff get all unless `mine=true`.
#[utoipa::path(
    get,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(RequestListQuery),
    responses(
        (status = 200, description = "Borrow requests", body = Vec<BorrowRequest>)
    )
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RequestListQuery>,
) -> AppResult<Json<Vec<BorrowRequest>>> {
    let requests = state.services.requests.list(&claims.actor(), query.mine).await?;
    Ok(Json(requests))
}

/// Get one borrow request
#[utoipa::path(
    get,
    path = "/requests/{id}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Borrow request ID")),
    responses(
        (status = 200, description = "Borrow request", body = BorrowRequest),
        (status = 403, description = "Not the caller's request"),
        (status = 404, description = "Borrow request not found")
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<BorrowRequest>> {
    let request = state.services.requests.get(&claims.actor(), id).await?;
    Ok(Json(request))
}

/// Request equipment for a date range; the units are reserved immediately
#[utoipa::path(
    post,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowRequest,
    responses(
        (status = 201, description = "Request created as PENDING", body = BorrowRequest),
        (status = 400, description = "Invalid dates or quantity"),
        (status = 403, description = "Role may not borrow"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Not enough units available")
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowRequest>)> {
    let actor = claims.actor();
    let request = state
        .services
        .requests
        .create(&actor, actor.user_id, data)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Approve, reject, issue or return a request
#[utoipa::path(
    post,
    path = "/requests/{id}/{action}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Borrow request ID"),
        ("action" = DecisionAction, Path, description = "approve | reject | issue | return")
    ),
    request_body(content = DecisionInput, description = "Optional message, kept on rejection"),
    responses(
        (status = 200, description = "Updated request", body = BorrowRequest),
        (status = 403, description = "Role may not decide"),
        (status = 404, description = "Borrow request not found"),
        (status = 409, description = "Action not allowed from the current status")
    )
)]
pub async fn decide_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<DecisionInput>>,
) -> AppResult<Json<BorrowRequest>> {
    let action: DecisionAction = action.parse().map_err(AppError::NotFound)?;

    let input = body.map(|Json(input)| input).unwrap_or_default();
    input.validate()?;

    let request = state
        .services
        .requests
        .decide(id, claims.role, action, input.message)
        .await?;
    Ok(Json(request))
}
