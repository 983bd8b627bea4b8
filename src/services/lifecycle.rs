//! Borrow request lifecycle.
//!
//! Requests reserve their units when they are created and hold them while
//! PENDING, APPROVED or ISSUED; rejection and return hand them back.
//! Decisions on one request id run one at a time.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::authorization::{authorize, permits, Action};
use crate::{
    error::{AppError, AppResult},
    models::{
        borrow_request::{
            BorrowRequest, BorrowStatus, CreateBorrowRequest, DecisionAction, StatusChange,
        },
        user::{Actor, Role},
    },
    repository::Repository,
};

/// One async mutex per request id with a decision in flight
#[derive(Default)]
struct TransitionLocks {
    slots: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl TransitionLocks {
    async fn acquire(&self, id: i64) -> OwnedMutexGuard<()> {
        let slot = self.slots.lock().await.entry(id).or_default().clone();
        slot.lock_owned().await
    }

    /// Drop the slot once nobody holds or waits on it
    async fn release(&self, id: i64, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut slots = self.slots.lock().await;
        if slots.get(&id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&id);
        }
    }
}

#[derive(Clone)]
pub struct LifecycleService {
    repository: Repository,
    locks: Arc<TransitionLocks>,
}

impl LifecycleService {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            locks: Arc::new(TransitionLocks::default()),
        }
    }

    /// Create a PENDING request for `requester_id`, reserving its units
    pub async fn create(
        &self,
        actor: &Actor,
        requester_id: i64,
        input: CreateBorrowRequest,
    ) -> AppResult<BorrowRequest> {
        authorize(actor.role, Action::CreateRequest)?;
        if actor.user_id != requester_id {
            return Err(AppError::Forbidden(
                "Requests can only be created for yourself".to_string(),
            ));
        }

        let new = input.into_new(requester_id)?;
        let (equipment_id, qty) = (new.equipment_id, new.qty);

        // Reservation and insert commit together in the store
        let request = match self.repository.requests.open(new, Utc::now()).await {
            Ok(request) => request,
            Err(e) => {
                if matches!(e, AppError::InsufficientStock(_)) {
                    tracing::warn!(
                        "Refused request by user {} for {} x equipment {}: {}",
                        requester_id,
                        qty,
                        equipment_id,
                        e
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Borrow request {} created by user {} ({} x equipment {})",
            request.id,
            requester_id,
            qty,
            equipment_id
        );
        Ok(request)
    }

    /// Apply a staff decision to a request
    pub async fn decide(
        &self,
        request_id: i64,
        role: Role,
        action: DecisionAction,
        message: Option<String>,
    ) -> AppResult<BorrowRequest> {
        let guard = self.locks.acquire(request_id).await;
        let result = self.decide_locked(request_id, role, action, message).await;
        self.locks.release(request_id, guard).await;
        result
    }

    async fn decide_locked(
        &self,
        request_id: i64,
        role: Role,
        action: DecisionAction,
        message: Option<String>,
    ) -> AppResult<BorrowRequest> {
        let request = self
            .repository
            .requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow request {} not found", request_id)))?;

        authorize(role, action.into())?;

        let current = request.status;
        let next = current.apply(action).ok_or_else(|| invalid_transition(request_id, action, current))?;

        let change = StatusChange {
            status: next,
            decision_message: match action {
                DecisionAction::Reject => message.filter(|m| !m.trim().is_empty()),
                _ => None,
            },
            at: Utc::now(),
            release: action.releases_units(),
        };

        // Another process may have moved the request since it was read
        let updated = self
            .repository
            .requests
            .transition(request_id, current, change)
            .await?
            .ok_or_else(|| invalid_transition(request_id, action, current))?;

        tracing::info!(
            "Borrow request {}: {} -> {} by {}",
            request_id,
            current,
            updated.status,
            role
        );

        Ok(updated)
    }

    /// Get one request; students only see their own
    pub async fn get(&self, actor: &Actor, request_id: i64) -> AppResult<BorrowRequest> {
        let request = self
            .repository
            .requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow request {} not found", request_id)))?;

        if request.requester_id == actor.user_id {
            authorize(actor.role, Action::ViewOwnRequests)?;
        } else {
            authorize(actor.role, Action::ViewAllRequests)?;
        }
        Ok(request)
    }

    /// All requests for staff, the caller's own otherwise or when `mine_only`
    pub async fn list(&self, actor: &Actor, mine_only: bool) -> AppResult<Vec<BorrowRequest>> {
        if !mine_only && permits(actor.role, Action::ViewAllRequests) {
            return self.repository.requests.list_all().await;
        }
        authorize(actor.role, Action::ViewOwnRequests)?;
        self.repository.requests.list_by_requester(actor.user_id).await
    }
}

fn invalid_transition(request_id: i64, action: DecisionAction, current: BorrowStatus) -> AppError {
    AppError::InvalidTransition(format!(
        "Cannot {} borrow request {} while it is {}",
        action, request_id, current
    ))
}
