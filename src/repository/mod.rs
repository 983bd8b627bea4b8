//! Repository layer: storage seams and their backends

pub mod equipment;
pub mod memory;
pub mod requests;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        borrow_request::{BorrowRequest, BorrowStatus, NewBorrowRequest, StatusChange},
        equipment::{Equipment, EquipmentQuery, NewEquipment, UpdateEquipment},
        user::{NewUserAccount, UserAccount},
    },
};

/// Per-equipment unit counters.
///
/// Every mutation on one equipment id is linearized with every other
/// mutation on that id; different ids never block each other.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Store a new equipment row; fails with `Validation` on broken
    /// quantities
    async fn create(&self, equipment: NewEquipment) -> AppResult<Equipment>;

    async fn get(&self, id: i64) -> AppResult<Equipment>;

    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>>;

    /// Change descriptive fields and/or the total. A new total shifts the
    /// available count by the same delta and must leave room for every
    /// unit currently reserved.
    async fn update(&self, id: i64, changes: &UpdateEquipment) -> AppResult<Equipment>;

    /// Take `qty` units iff at least `qty` are available; no mutation
    /// otherwise (`InsufficientStock`).
    async fn reserve(&self, id: i64, qty: i32) -> AppResult<Equipment>;

    /// Give `qty` units back, clamped to the total.
    async fn release(&self, id: i64, qty: i32) -> AppResult<Equipment>;

    async fn count(&self) -> AppResult<i64>;
}

/// Borrow request records.
///
/// Operations that move inventory take the request's units in the same
/// unit of work as the record change: either both are applied or neither
/// is, including when the caller stops polling midway. Reads always
/// observe a fully applied change.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Reserve the request's units and store it as PENDING. Nothing is
    /// reserved or stored when either part fails.
    async fn open(&self, request: NewBorrowRequest, at: DateTime<Utc>) -> AppResult<BorrowRequest>;

    async fn get_by_id(&self, id: i64) -> AppResult<Option<BorrowRequest>>;

    async fn list_all(&self) -> AppResult<Vec<BorrowRequest>>;

    async fn list_by_requester(&self, requester_id: i64) -> AppResult<Vec<BorrowRequest>>;

    /// Compare-and-set on status: applies `change` only while the stored
    /// status is still `expected`. `None` when it no longer is. With
    /// `change.release` the units go back to the ledger together with the
    /// status change.
    async fn transition(
        &self,
        id: i64,
        expected: BorrowStatus,
        change: StatusChange,
    ) -> AppResult<Option<BorrowRequest>>;
}

/// Account records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the username is taken
    async fn insert(&self, account: NewUserAccount) -> AppResult<UserAccount>;

    async fn get_by_id(&self, id: i64) -> AppResult<Option<UserAccount>>;

    async fn get_by_username(&self, username: &str) -> AppResult<Option<UserAccount>>;

    async fn count(&self) -> AppResult<i64>;
}

/// Main repository struct holding the three stores
#[derive(Clone)]
pub struct Repository {
    pub equipment: Arc<dyn InventoryLedger>,
    pub requests: Arc<dyn RequestStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Process-local stores
    pub fn in_memory() -> Self {
        let inventory = Arc::new(memory::MemoryInventory::default());
        Self {
            requests: Arc::new(memory::MemoryRequestStore::new(inventory.clone())),
            equipment: inventory,
            users: Arc::new(memory::MemoryUserStore::default()),
        }
    }

    /// Stores backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            equipment: Arc::new(equipment::EquipmentRepository::new(pool.clone())),
            requests: Arc::new(requests::RequestsRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }
}
