//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, equipment, health, requests};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lending Portal API",
        version = "0.1.0",
        description = "Equipment lending: catalog, borrow requests and their approval workflow"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::signup,
        auth::me,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        // Borrow requests
        requests::list_requests,
        requests::get_request,
        requests::create_request,
        requests::decide_request,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::Role,
            crate::models::user::LoginRequest,
            crate::models::user::SignupRequest,
            crate::models::user::LoginResponse,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            // Borrow requests
            crate::models::borrow_request::BorrowRequest,
            crate::models::borrow_request::BorrowStatus,
            crate::models::borrow_request::DecisionAction,
            crate::models::borrow_request::CreateBorrowRequest,
            crate::models::borrow_request::DecisionInput,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "equipment", description = "Equipment catalog"),
        (name = "requests", description = "Borrow requests and decisions")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
