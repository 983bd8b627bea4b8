//! Equipment inventory on PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use super::InventoryLedger;
use crate::{
    error::{AppError, AppResult},
    models::equipment::{Equipment, EquipmentQuery, NewEquipment, UpdateEquipment},
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Equipment {} not found", id))
}

async fn find_row(conn: &mut PgConnection, id: i64) -> AppResult<Option<Equipment>> {
    let row = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Conditional decrement; runs on whatever connection or transaction the caller holds
pub(crate) async fn take_units(
    conn: &mut PgConnection,
    id: i64,
    qty: i32,
    at: DateTime<Utc>,
) -> AppResult<Equipment> {
    let row = sqlx::query_as::<_, Equipment>(
        r#"
        UPDATE equipment
        SET available_quantity = available_quantity - $2, updated_at = $3
        WHERE id = $1 AND $2 >= 1 AND available_quantity >= $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(qty)
    .bind(at)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(row),
        None => {
            let current = find_row(conn, id).await?.ok_or_else(|| not_found(id))?;
            Err(AppError::InsufficientStock(format!(
                "Requested {} of '{}' but only {} available",
                qty, current.name, current.available_quantity
            )))
        }
    }
}

/// Increment clamped to the total
pub(crate) async fn return_units(
    conn: &mut PgConnection,
    id: i64,
    qty: i32,
    at: DateTime<Utc>,
) -> AppResult<Equipment> {
    sqlx::query_as::<_, Equipment>(
        r#"
        UPDATE equipment
        SET available_quantity = LEAST(total_quantity, available_quantity + GREATEST($2, 0)),
            updated_at = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(qty)
    .bind(at)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| not_found(id))
}

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn find(&self, id: i64) -> AppResult<Option<Equipment>> {
        let mut conn = self.pool.acquire().await?;
        find_row(&mut conn, id).await
    }
}

#[async_trait]
impl InventoryLedger for EquipmentRepository {
    async fn create(&self, equipment: NewEquipment) -> AppResult<Equipment> {
        equipment.check()?;
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (name, category, condition_note, total_quantity, available_quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&equipment.name)
        .bind(&equipment.category)
        .bind(&equipment.condition_note)
        .bind(equipment.total_quantity)
        .bind(equipment.available_quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: i64) -> AppResult<Equipment> {
        self.find(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let category = query
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let rows = match category {
            Some(category) => {
                sqlx::query_as::<_, Equipment>(
                    "SELECT * FROM equipment WHERE LOWER(category) = LOWER($1) ORDER BY name, id",
                )
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None if query.available_only => {
                sqlx::query_as::<_, Equipment>(
                    "SELECT * FROM equipment WHERE available_quantity > 0 ORDER BY name, id",
                )
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Equipment>("SELECT * FROM equipment ORDER BY name, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn update(&self, id: i64, changes: &UpdateEquipment) -> AppResult<Equipment> {
        // SET expressions all read the pre-update row, so the available
        // count moves by exactly (new total - old total).
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment SET
                name = COALESCE($2, name),
                category = COALESCE($3, category),
                condition_note = COALESCE($4, condition_note),
                total_quantity = COALESCE($5, total_quantity),
                available_quantity = available_quantity + (COALESCE($5, total_quantity) - total_quantity),
                updated_at = $6
            WHERE id = $1
              AND COALESCE($5, total_quantity) >= (total_quantity - available_quantity)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.category)
        .bind(&changes.condition_note)
        .bind(changes.total_quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => {
                let current = self.get(id).await?;
                Err(AppError::Validation(format!(
                    "totalQuantity {} is below the {} units currently reserved",
                    changes.total_quantity.unwrap_or(current.total_quantity),
                    current.reserved_quantity()
                )))
            }
        }
    }

    async fn reserve(&self, id: i64, qty: i32) -> AppResult<Equipment> {
        let mut conn = self.pool.acquire().await?;
        take_units(&mut conn, id, qty, Utc::now()).await
    }

    async fn release(&self, id: i64, qty: i32) -> AppResult<Equipment> {
        let mut conn = self.pool.acquire().await?;
        return_units(&mut conn, id, qty, Utc::now()).await
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM equipment")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
