//! Equipment lending portal
//!
//! REST JSON server for an equipment-lending system: a catalog with
//! per-item unit counts, and borrow requests that move through
//! PENDING → APPROVED → ISSUED → RETURNED (or PENDING → REJECTED) while
//! holding a reservation of their units.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
