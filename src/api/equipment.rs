//! Equipment API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::equipment::{CreateEquipment, Equipment, EquipmentQuery, UpdateEquipment},
    AppState,
};

use super::AuthenticatedUser;

/// List equipment, optionally by category or availability
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(EquipmentQuery),
    responses(
        (status = 200, description = "Equipment list", body = Vec<Equipment>)
    )
)]
pub async fn list_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<EquipmentQuery>,
) -> AppResult<Json<Vec<Equipment>>> {
    let equipment = state.services.equipment.list(claims.role, &query).await?;
    Ok(Json(equipment))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Equipment>> {
    let equipment = state.services.equipment.get_by_id(claims.role, id).await?;
    Ok(Json(equipment))
}

/// Create equipment
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = Equipment),
        (status = 400, description = "Invalid quantities"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn create_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<Equipment>)> {
    let equipment = state.services.equipment.create(claims.role, data).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Update equipment
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Equipment ID")),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = Equipment),
        (status = 400, description = "Total below reserved units"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn update_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(data): Json<UpdateEquipment>,
) -> AppResult<Json<Equipment>> {
    let equipment = state.services.equipment.update(claims.role, id, data).await?;
    Ok(Json(equipment))
}
