//! API handlers for the lending portal REST endpoints

pub mod auth;
pub mod equipment;
pub mod health;
pub mod openapi;
pub mod requests;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Alternative to `Authorization: Bearer <jwt>` carrying the bare token
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match parts.headers.get(AUTHORIZATION) {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|header| header.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    AppError::Authentication("Invalid authorization header format".to_string())
                })?,
            None => parts
                .headers
                .get(AUTH_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?,
        };

        let claims = state.services.users.verify_token(token.trim())?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/me", get(auth::me))
        // Equipment catalog
        .route(
            "/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route(
            "/equipment/:id",
            get(equipment::get_equipment).put(equipment::update_equipment),
        )
        // Borrow requests
        .route(
            "/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/:action", post(requests::decide_request))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
