//! Liveness and readiness checks

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{config::StorageBackend, error::AppResult, AppState};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: String,
    /// "memory" or "postgres"
    pub storage: String,
    /// Equipment rows visible through the ledger
    pub equipment_count: i64,
}

/// Liveness check; never touches storage
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check; fails when the configured storage cannot be read
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Storage reachable", body = ReadinessResponse),
        (status = 500, description = "Storage unreachable", body = crate::error::ErrorResponse)
    )
)]
pub async fn readiness_check(State(state): State<AppState>) -> AppResult<Json<ReadinessResponse>> {
    let equipment_count = state.services.equipment.count().await?;
    let storage = match state.config.storage.backend {
        StorageBackend::Memory => "memory",
        StorageBackend::Postgres => "postgres",
    };

    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        storage: storage.to_string(),
        equipment_count,
    }))
}
