//! Data models for the lending portal

pub mod borrow_request;
pub mod equipment;
pub mod user;

// Re-export commonly used types
pub use borrow_request::{BorrowRequest, BorrowStatus, DecisionAction};
pub use equipment::Equipment;
pub use user::{Actor, Role, UserAccount, UserClaims};
