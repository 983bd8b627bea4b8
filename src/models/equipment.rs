//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Equipment record with its inventory counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    /// Free-form note about wear, missing parts, ...
    pub condition_note: Option<String>,
    /// Units owned, always >= 1
    pub total_quantity: i32,
    /// Units not held by any open request, 0..=total_quantity
    pub available_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Units currently held by PENDING, APPROVED or ISSUED requests
    pub fn reserved_quantity(&self) -> i32 {
        self.total_quantity - self.available_quantity
    }
}

/// Create equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEquipment {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    pub category: Option<String>,
    pub condition_note: Option<String>,
    #[validate(range(min = 1, message = "totalQuantity must be at least 1"))]
    pub total_quantity: i32,
    /// Defaults to `total_quantity`
    #[validate(range(min = 0, message = "availableQuantity must be >= 0"))]
    pub available_quantity: Option<i32>,
}

/// Validated equipment ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEquipment {
    pub name: String,
    pub category: Option<String>,
    pub condition_note: Option<String>,
    pub total_quantity: i32,
    pub available_quantity: i32,
}

impl NewEquipment {
    /// Quantity rules every stored row satisfies
    pub fn check(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if self.total_quantity < 1
            || self.available_quantity < 0
            || self.available_quantity > self.total_quantity
        {
            return Err(AppError::Validation(format!(
                "Invalid quantities: available {} of total {}",
                self.available_quantity, self.total_quantity
            )));
        }
        Ok(())
    }
}

impl TryFrom<CreateEquipment> for NewEquipment {
    type Error = AppError;

    fn try_from(data: CreateEquipment) -> AppResult<Self> {
        data.validate()?;

        let available = data.available_quantity.unwrap_or(data.total_quantity);
        let new = NewEquipment {
            name: data.name.trim().to_string(),
            category: data.category.filter(|c| !c.trim().is_empty()),
            condition_note: data.condition_note,
            total_quantity: data.total_quantity,
            available_quantity: available,
        };
        new.check()?;
        Ok(new)
    }
}

/// Update equipment request. Available units follow total changes; they
/// are never set directly.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEquipment {
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub name: Option<String>,
    pub category: Option<String>,
    pub condition_note: Option<String>,
    #[validate(range(min = 1, message = "totalQuantity must be at least 1"))]
    pub total_quantity: Option<i32>,
}

/// Catalog query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EquipmentQuery {
    /// Case-insensitive category match; takes precedence over `availableOnly`
    pub category: Option<String>,
    #[serde(default)]
    pub available_only: bool,
}

impl EquipmentQuery {
    /// Whether a row belongs to this projection
    pub fn matches(&self, equipment: &Equipment) -> bool {
        match self.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(category) => equipment
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(category)),
            None => !self.available_only || equipment.available_quantity > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(total: i32, available: Option<i32>) -> CreateEquipment {
        CreateEquipment {
            name: "Canon EOS 80D".to_string(),
            category: Some("Camera".to_string()),
            condition_note: None,
            total_quantity: total,
            available_quantity: available,
        }
    }

    fn sample(category: Option<&str>, available: i32) -> Equipment {
        let now = Utc::now();
        Equipment {
            id: 1,
            name: "Kit".to_string(),
            category: category.map(str::to_string),
            condition_note: None,
            total_quantity: 5,
            available_quantity: available,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_available_defaults_to_total() {
        let new = NewEquipment::try_from(create(5, None)).unwrap();
        assert_eq!(new.total_quantity, 5);
        assert_eq!(new.available_quantity, 5);
    }

    #[test]
    fn test_rejects_available_above_total() {
        let err = NewEquipment::try_from(create(3, Some(4))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_rejects_non_positive_total() {
        assert!(matches!(
            NewEquipment::try_from(create(0, None)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            NewEquipment::try_from(create(2, Some(-1))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_blank_name() {
        let mut data = create(1, None);
        data.name = "   ".to_string();
        assert!(matches!(NewEquipment::try_from(data), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_check_guards_rows_built_directly() {
        let mut new = NewEquipment::try_from(create(4, Some(1))).unwrap();
        assert!(new.check().is_ok());

        new.available_quantity = 5;
        assert!(matches!(new.check(), Err(AppError::Validation(_))));
        new.available_quantity = -1;
        assert!(matches!(new.check(), Err(AppError::Validation(_))));
        new.available_quantity = 0;
        new.total_quantity = 0;
        assert!(matches!(new.check(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_query_category_takes_precedence() {
        let query = EquipmentQuery {
            category: Some("camera".to_string()),
            available_only: true,
        };
        assert!(query.matches(&sample(Some("Camera"), 0)));
        assert!(!query.matches(&sample(Some("Lab"), 3)));
    }

    #[test]
    fn test_query_available_only() {
        let query = EquipmentQuery {
            category: None,
            available_only: true,
        };
        assert!(query.matches(&sample(None, 1)));
        assert!(!query.matches(&sample(None, 0)));
        assert!(EquipmentQuery::default().matches(&sample(None, 0)));
    }
}
