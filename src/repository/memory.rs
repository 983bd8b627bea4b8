//! Process-local stores.
//!
//! Each map holds one `Arc<Mutex<_>>` per row: the map lock is only taken
//! to find or insert a row, and the row lock scopes every mutation to a
//! single id.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::{InventoryLedger, RequestStore, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        borrow_request::{BorrowRequest, BorrowStatus, NewBorrowRequest, StatusChange},
        equipment::{Equipment, EquipmentQuery, NewEquipment, UpdateEquipment},
        user::{NewUserAccount, UserAccount},
    },
};

type Rows<T> = RwLock<BTreeMap<i64, Arc<Mutex<T>>>>;

async fn row<T>(rows: &Rows<T>, id: i64) -> Option<Arc<Mutex<T>>> {
    rows.read().await.get(&id).cloned()
}

async fn snapshot<T: Clone>(rows: &Rows<T>) -> Vec<T> {
    let handles: Vec<_> = rows.read().await.values().cloned().collect();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.lock().await.clone());
    }
    out
}

fn equipment_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Equipment {} not found", id))
}

fn take_units(equipment: &mut Equipment, qty: i32, at: DateTime<Utc>) -> AppResult<()> {
    if qty < 1 || equipment.available_quantity < qty {
        return Err(AppError::InsufficientStock(format!(
            "Requested {} of '{}' but only {} available",
            qty, equipment.name, equipment.available_quantity
        )));
    }
    equipment.available_quantity -= qty;
    equipment.updated_at = at;
    Ok(())
}

fn return_units(equipment: &mut Equipment, qty: i32, at: DateTime<Utc>) {
    let released = equipment.available_quantity.saturating_add(qty.max(0));
    if released > equipment.total_quantity {
        tracing::warn!(
            "Release of {} units on equipment {} clamped to total {}",
            qty,
            equipment.id,
            equipment.total_quantity
        );
    }
    equipment.available_quantity = released.min(equipment.total_quantity);
    equipment.updated_at = at;
}

/// In-memory inventory ledger
#[derive(Default)]
pub struct MemoryInventory {
    rows: Rows<Equipment>,
    next_id: AtomicI64,
}

#[async_trait]
impl InventoryLedger for MemoryInventory {
    async fn create(&self, equipment: NewEquipment) -> AppResult<Equipment> {
        equipment.check()?;
        let now = Utc::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = Equipment {
            id,
            name: equipment.name,
            category: equipment.category,
            condition_note: equipment.condition_note,
            total_quantity: equipment.total_quantity,
            available_quantity: equipment.available_quantity,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.insert(id, Arc::new(Mutex::new(row.clone())));
        Ok(row)
    }

    async fn get(&self, id: i64) -> AppResult<Equipment> {
        let handle = row(&self.rows, id).await.ok_or_else(|| equipment_not_found(id))?;
        let equipment = handle.lock().await.clone();
        Ok(equipment)
    }

    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let mut rows: Vec<_> = snapshot(&self.rows)
            .await
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update(&self, id: i64, changes: &UpdateEquipment) -> AppResult<Equipment> {
        let handle = row(&self.rows, id).await.ok_or_else(|| equipment_not_found(id))?;
        let mut equipment = handle.lock().await;

        if let Some(total) = changes.total_quantity {
            let reserved = equipment.reserved_quantity();
            if total < reserved.max(1) {
                return Err(AppError::Validation(format!(
                    "totalQuantity {} is below the {} units currently reserved",
                    total, reserved
                )));
            }
            equipment.available_quantity = total - reserved;
            equipment.total_quantity = total;
        }
        if let Some(ref name) = changes.name {
            equipment.name = name.clone();
        }
        if let Some(ref category) = changes.category {
            equipment.category = Some(category.clone());
        }
        if let Some(ref note) = changes.condition_note {
            equipment.condition_note = Some(note.clone());
        }
        equipment.updated_at = Utc::now();

        Ok(equipment.clone())
    }

    async fn reserve(&self, id: i64, qty: i32) -> AppResult<Equipment> {
        let handle = row(&self.rows, id).await.ok_or_else(|| equipment_not_found(id))?;
        let mut equipment = handle.lock().await;
        take_units(&mut equipment, qty, Utc::now())?;
        Ok(equipment.clone())
    }

    async fn release(&self, id: i64, qty: i32) -> AppResult<Equipment> {
        let handle = row(&self.rows, id).await.ok_or_else(|| equipment_not_found(id))?;
        let mut equipment = handle.lock().await;
        return_units(&mut equipment, qty, Utc::now());
        Ok(equipment.clone())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.rows.read().await.len() as i64)
    }
}

/// In-memory request store over a shared inventory.
///
/// Changes that move units hold the request row (or map) lock and the
/// equipment row lock together and mutate both with no await in between,
/// so a dropped future never leaves one half applied.
pub struct MemoryRequestStore {
    rows: Rows<BorrowRequest>,
    next_id: AtomicI64,
    inventory: Arc<MemoryInventory>,
}

impl MemoryRequestStore {
    pub fn new(inventory: Arc<MemoryInventory>) -> Self {
        Self {
            rows: RwLock::default(),
            next_id: AtomicI64::new(0),
            inventory,
        }
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn open(&self, request: NewBorrowRequest, at: DateTime<Utc>) -> AppResult<BorrowRequest> {
        let handle = row(&self.inventory.rows, request.equipment_id)
            .await
            .ok_or_else(|| equipment_not_found(request.equipment_id))?;
        let mut equipment = handle.lock().await;
        let mut rows = self.rows.write().await;

        take_units(&mut equipment, request.qty, at)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = BorrowRequest {
            id,
            equipment_id: request.equipment_id,
            requester_id: request.requester_id,
            start_date: request.start_date,
            end_date: request.end_date,
            qty: request.qty,
            status: BorrowStatus::Pending,
            decision_message: None,
            created_at: at,
            updated_at: at,
        };
        rows.insert(id, Arc::new(Mutex::new(row.clone())));
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<BorrowRequest>> {
        match row(&self.rows, id).await {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> AppResult<Vec<BorrowRequest>> {
        Ok(snapshot(&self.rows).await)
    }

    async fn list_by_requester(&self, requester_id: i64) -> AppResult<Vec<BorrowRequest>> {
        Ok(snapshot(&self.rows)
            .await
            .into_iter()
            .filter(|r| r.requester_id == requester_id)
            .collect())
    }

    async fn transition(
        &self,
        id: i64,
        expected: BorrowStatus,
        change: StatusChange,
    ) -> AppResult<Option<BorrowRequest>> {
        let Some(handle) = row(&self.rows, id).await else {
            return Ok(None);
        };
        let mut request = handle.lock().await;
        if request.status != expected {
            return Ok(None);
        }

        // Lock order: request row, then equipment row
        let equipment_handle = if change.release {
            let equipment_id = request.equipment_id;
            Some(
                row(&self.inventory.rows, equipment_id)
                    .await
                    .ok_or_else(|| equipment_not_found(equipment_id))?,
            )
        } else {
            None
        };
        let mut equipment = match &equipment_handle {
            Some(handle) => Some(handle.lock().await),
            None => None,
        };

        if let Some(equipment) = equipment.as_deref_mut() {
            return_units(equipment, request.qty, change.at);
        }
        request.status = change.status;
        if change.decision_message.is_some() {
            request.decision_message = change.decision_message;
        }
        request.updated_at = change.at;

        Ok(Some(request.clone()))
    }
}

/// In-memory account store
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<BTreeMap<i64, UserAccount>>,
    next_id: AtomicI64,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, account: NewUserAccount) -> AppResult<UserAccount> {
        // Held across the uniqueness check and the insert
        let mut rows = self.rows.write().await;
        if rows.values().any(|u| u.username == account.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                account.username
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = UserAccount {
            id,
            username: account.username,
            password_hash: account.password_hash,
            role: account.role,
            display_name: account.display_name,
            created_at: Utc::now(),
        };
        rows.insert(id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<UserAccount>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<UserAccount>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.rows.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn camera(total: i32, available: i32) -> NewEquipment {
        NewEquipment {
            name: "Canon EOS 80D".to_string(),
            category: Some("Camera".to_string()),
            condition_note: None,
            total_quantity: total,
            available_quantity: available,
        }
    }

    fn new_request(requester_id: i64) -> NewBorrowRequest {
        NewBorrowRequest {
            equipment_id: 1,
            requester_id,
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            qty: 1,
        }
    }

    #[tokio::test]
    async fn test_reserve_fails_without_mutation() {
        let ledger = MemoryInventory::default();
        let eq = ledger.create(camera(5, 2)).await.unwrap();

        let err = ledger.reserve(eq.id, 3).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(ledger.get(eq.id).await.unwrap().available_quantity, 2);

        let after = ledger.reserve(eq.id, 2).await.unwrap();
        assert_eq!(after.available_quantity, 0);
    }

    #[tokio::test]
    async fn test_release_is_clamped_to_total() {
        let ledger = MemoryInventory::default();
        let eq = ledger.create(camera(5, 4)).await.unwrap();

        let after = ledger.release(eq.id, 3).await.unwrap();
        assert_eq!(after.available_quantity, 5);
    }

    #[tokio::test]
    async fn test_unknown_equipment_is_not_found() {
        let ledger = MemoryInventory::default();
        assert!(matches!(ledger.reserve(9, 1).await, Err(AppError::NotFound(_))));
        assert!(matches!(ledger.release(9, 1).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_total_keeps_reserved_units() {
        let ledger = MemoryInventory::default();
        let eq = ledger.create(camera(5, 5)).await.unwrap();
        ledger.reserve(eq.id, 3).await.unwrap();

        let grown = ledger
            .update(eq.id, &UpdateEquipment { total_quantity: Some(8), ..Default::default() })
            .await
            .unwrap();
        assert_eq!((grown.total_quantity, grown.available_quantity), (8, 5));

        let err = ledger
            .update(eq.id, &UpdateEquipment { total_quantity: Some(2), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(ledger.get(eq.id).await.unwrap().total_quantity, 8);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversubscribe() {
        let ledger = Arc::new(MemoryInventory::default());
        let id = ledger.create(camera(10, 10)).await.unwrap().id;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.reserve(id, 1).await.is_ok() }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 10);
        assert_eq!(ledger.get(id).await.unwrap().available_quantity, 0);
    }

    async fn store_with_camera(total: i32) -> MemoryRequestStore {
        let inventory = Arc::new(MemoryInventory::default());
        inventory.create(camera(total, total)).await.unwrap();
        MemoryRequestStore::new(inventory)
    }

    fn change(status: BorrowStatus, release: bool) -> StatusChange {
        StatusChange {
            status,
            decision_message: None,
            at: Utc::now(),
            release,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_bad_quantities() {
        let ledger = MemoryInventory::default();

        for (total, available) in [(0, 0), (-2, 0), (3, 4), (3, -1)] {
            let err = ledger.create(camera(total, available)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(ledger.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_takes_units_with_the_row() {
        let store = store_with_camera(2).await;

        let request = store.open(new_request(1), Utc::now()).await.unwrap();
        assert_eq!(request.status, BorrowStatus::Pending);
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 1);

        let mut greedy = new_request(2);
        greedy.qty = 2;
        let err = store.open(greedy, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 1);

        let mut missing = new_request(2);
        missing.equipment_id = 42;
        assert!(matches!(store.open(missing, Utc::now()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = store_with_camera(3).await;
        let request = store.open(new_request(1), Utc::now()).await.unwrap();

        let reject = StatusChange {
            decision_message: Some("not available".to_string()),
            ..change(BorrowStatus::Rejected, true)
        };
        let first = store
            .transition(request.id, BorrowStatus::Pending, reject.clone())
            .await
            .unwrap();
        assert_eq!(first.unwrap().decision_message.as_deref(), Some("not available"));
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 3);

        let second = store
            .transition(request.id, BorrowStatus::Pending, reject)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 3);
    }

    #[tokio::test]
    async fn test_transition_without_release_keeps_units() {
        let store = store_with_camera(3).await;
        let request = store.open(new_request(1), Utc::now()).await.unwrap();

        let approved = store
            .transition(request.id, BorrowStatus::Pending, change(BorrowStatus::Approved, false))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, BorrowStatus::Approved);
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 2);
    }

    #[tokio::test]
    async fn test_interrupted_release_changes_nothing() {
        let store = store_with_camera(5).await;
        let mut request = new_request(1);
        request.qty = 3;
        let id = store.open(request, Utc::now()).await.unwrap().id;
        store
            .transition(id, BorrowStatus::Pending, change(BorrowStatus::Issued, false))
            .await
            .unwrap();

        // Hold the equipment row so the release cannot finish
        let held = row(&store.inventory.rows, 1).await.unwrap().lock_owned().await;
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            store.transition(id, BorrowStatus::Issued, change(BorrowStatus::Returned, true)),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(held.available_quantity, 2);
        drop(held);

        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, BorrowStatus::Issued);
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 2);

        let returned = store
            .transition(id, BorrowStatus::Issued, change(BorrowStatus::Returned, true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(returned.status, BorrowStatus::Returned);
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 5);
    }

    #[tokio::test]
    async fn test_interrupted_open_stores_nothing() {
        let store = store_with_camera(5).await;

        let held = row(&store.inventory.rows, 1).await.unwrap().lock_owned().await;
        let result =
            tokio::time::timeout(Duration::from_millis(50), store.open(new_request(1), Utc::now()))
                .await;
        assert!(result.is_err());
        drop(held);

        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(store.inventory.get(1).await.unwrap().available_quantity, 5);

        let request = store.open(new_request(1), Utc::now()).await.unwrap();
        assert_eq!(request.id, 1);
    }

    #[tokio::test]
    async fn test_release_of_missing_equipment_keeps_status() {
        let store = MemoryRequestStore::new(Arc::new(MemoryInventory::default()));
        let row = BorrowRequest {
            id: 7,
            equipment_id: 99,
            requester_id: 1,
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            qty: 1,
            status: BorrowStatus::Pending,
            decision_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.rows.write().await.insert(7, Arc::new(Mutex::new(row)));

        let err = store
            .transition(7, BorrowStatus::Pending, change(BorrowStatus::Rejected, true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.get_by_id(7).await.unwrap().unwrap().status, BorrowStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_by_requester() {
        let store = store_with_camera(5).await;
        store.open(new_request(1), Utc::now()).await.unwrap();
        store.open(new_request(2), Utc::now()).await.unwrap();
        store.open(new_request(1), Utc::now()).await.unwrap();

        assert_eq!(store.list_all().await.unwrap().len(), 3);
        let mine = store.list_by_requester(1).await.unwrap();
        assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryUserStore::default();
        let account = NewUserAccount {
            username: "ram".to_string(),
            password_hash: "x".to_string(),
            role: Role::Student,
            display_name: "Sai Ram".to_string(),
        };
        store.insert(account.clone()).await.unwrap();
        assert!(matches!(store.insert(account).await, Err(AppError::Conflict(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
