//! Role/action permission table.
//!
//! The one place that decides who may do what. Pairs not listed are denied.

use crate::{
    error::{AppError, AppResult},
    models::{borrow_request::DecisionAction, user::Role},
};

/// Every action the lending core guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    BrowseCatalog,
    CreateRequest,
    ViewOwnRequests,
    ViewAllRequests,
    Approve,
    Reject,
    Issue,
    Return,
    CreateEquipment,
    ManageEquipment,
}

impl From<DecisionAction> for Action {
    fn from(action: DecisionAction) -> Self {
        match action {
            DecisionAction::Approve => Action::Approve,
            DecisionAction::Reject => Action::Reject,
            DecisionAction::Issue => Action::Issue,
            DecisionAction::Return => Action::Return,
        }
    }
}

pub fn permits(role: Role, action: Action) -> bool {
    use Action::*;

    match (role, action) {
        (_, BrowseCatalog | ViewOwnRequests) => true,
        (Role::Student, CreateRequest) => true,
        (Role::Staff | Role::Admin, ViewAllRequests | Approve | Reject | Issue | Return) => true,
        (Role::Admin, CreateEquipment | ManageEquipment) => true,
        _ => false,
    }
}

/// `permits` as a result, for `?` at call sites
pub fn authorize(role: Role, action: Action) -> AppResult<()> {
    if permits(role, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{} may not {:?}", role, action)))
    }
}
