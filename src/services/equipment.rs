//! Equipment catalog service

use validator::Validate;

use super::authorization::{authorize, Action};
use crate::{
    error::AppResult,
    models::{
        equipment::{CreateEquipment, Equipment, EquipmentQuery, NewEquipment, UpdateEquipment},
        user::Role,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
}

impl EquipmentService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, role: Role, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        authorize(role, Action::BrowseCatalog)?;
        let equipment = self.repository.equipment.list(query).await?;
        tracing::debug!("Catalog query {:?} matched {} rows", query, equipment.len());
        Ok(equipment)
    }

    pub async fn get_by_id(&self, role: Role, id: i64) -> AppResult<Equipment> {
        authorize(role, Action::BrowseCatalog)?;
        self.repository.equipment.get(id).await
    }

    /// Add equipment to the catalog (admin only)
    pub async fn create(&self, role: Role, data: CreateEquipment) -> AppResult<Equipment> {
        authorize(role, Action::CreateEquipment)?;
        let new = NewEquipment::try_from(data)?;
        let equipment = self.repository.equipment.create(new).await?;
        tracing::info!(
            "Equipment {} '{}' created with {}/{} units available",
            equipment.id,
            equipment.name,
            equipment.available_quantity,
            equipment.total_quantity
        );
        Ok(equipment)
    }

    /// Edit descriptive fields or the owned total (admin only)
    pub async fn update(&self, role: Role, id: i64, data: UpdateEquipment) -> AppResult<Equipment> {
        authorize(role, Action::ManageEquipment)?;
        data.validate()?;
        let equipment = self.repository.equipment.update(id, &data).await?;
        tracing::info!(
            "Equipment {} updated: {}/{} units available",
            equipment.id,
            equipment.available_quantity,
            equipment.total_quantity
        );
        Ok(equipment)
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.repository.equipment.count().await
    }
}
