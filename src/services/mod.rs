//! Business logic services

pub mod authorization;
pub mod equipment;
pub mod lifecycle;
pub mod seed;
pub mod users;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub equipment: equipment::EquipmentService,
    pub requests: lifecycle::LifecycleService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        Self {
            equipment: equipment::EquipmentService::new(repository.clone()),
            requests: lifecycle::LifecycleService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), auth_config),
            repository,
        }
    }
}
