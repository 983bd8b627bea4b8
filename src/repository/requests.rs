//! Borrow requests on PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::{
    equipment::{return_units, take_units},
    RequestStore,
};
use crate::{
    error::AppResult,
    models::borrow_request::{BorrowRequest, BorrowStatus, NewBorrowRequest, StatusChange},
};

#[derive(Clone)]
pub struct RequestsRepository {
    pool: Pool<Postgres>,
}

impl RequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for RequestsRepository {
    async fn open(&self, request: NewBorrowRequest, at: DateTime<Utc>) -> AppResult<BorrowRequest> {
        let mut tx = self.pool.begin().await?;
        take_units(&mut tx, request.equipment_id, request.qty, at).await?;

        let row = sqlx::query_as::<_, BorrowRequest>(
            r#"
            INSERT INTO borrow_requests
                (equipment_id, requester_id, start_date, end_date, qty, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(request.equipment_id)
        .bind(request.requester_id)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.qty)
        .bind(BorrowStatus::Pending)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<BorrowRequest>> {
        let row = sqlx::query_as::<_, BorrowRequest>("SELECT * FROM borrow_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_all(&self) -> AppResult<Vec<BorrowRequest>> {
        let rows = sqlx::query_as::<_, BorrowRequest>("SELECT * FROM borrow_requests ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_by_requester(&self, requester_id: i64) -> AppResult<Vec<BorrowRequest>> {
        let rows = sqlx::query_as::<_, BorrowRequest>(
            "SELECT * FROM borrow_requests WHERE requester_id = $1 ORDER BY id",
        )
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn transition(
        &self,
        id: i64,
        expected: BorrowStatus,
        change: StatusChange,
    ) -> AppResult<Option<BorrowRequest>> {
        // Dropping the transaction before commit rolls both statements back
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, BorrowRequest>(
            r#"
            UPDATE borrow_requests
            SET status = $3,
                decision_message = COALESCE($4, decision_message),
                updated_at = $5
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(change.status)
        .bind(change.decision_message)
        .bind(change.at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        if change.release {
            return_units(&mut tx, row.equipment_id, row.qty, change.at).await?;
        }

        tx.commit().await?;
        Ok(Some(row))
    }
}
