//! Borrow request model and its status machine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Lifecycle status of a borrow request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowStatus {
    Pending,
    Approved,
    Issued,
    Returned,
    Rejected,
}

/// Decision applied to an existing request by staff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approve,
    Reject,
    Issue,
    Return,
}

impl BorrowStatus {
    /// Transition table. `None` means the action is illegal from `self`.
    pub fn apply(self, action: DecisionAction) -> Option<BorrowStatus> {
        use BorrowStatus::*;
        use DecisionAction as A;

        match (self, action) {
            (Pending, A::Approve) => Some(Approved),
            (Pending, A::Reject) => Some(Rejected),
            (Approved, A::Issue) => Some(Issued),
            (Issued, A::Return) => Some(Returned),
            (Pending, A::Issue | A::Return)
            | (Approved, A::Approve | A::Reject | A::Return)
            | (Issued, A::Approve | A::Reject | A::Issue)
            | (Returned, _)
            | (Rejected, _) => None,
        }
    }

    /// Whether a request in this status holds `qty` units of its equipment
    pub fn holds_reservation(self) -> bool {
        matches!(self, BorrowStatus::Pending | BorrowStatus::Approved | BorrowStatus::Issued)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BorrowStatus::Returned | BorrowStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Pending => "PENDING",
            BorrowStatus::Approved => "APPROVED",
            BorrowStatus::Issued => "ISSUED",
            BorrowStatus::Returned => "RETURNED",
            BorrowStatus::Rejected => "REJECTED",
        }
    }
}

impl DecisionAction {
    /// Whether applying this action hands the reserved units back
    pub fn releases_units(self) -> bool {
        matches!(self, DecisionAction::Reject | DecisionAction::Return)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Approve => "approve",
            DecisionAction::Reject => "reject",
            DecisionAction::Issue => "issue",
            DecisionAction::Return => "return",
        }
    }
}

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(BorrowStatus::Pending),
            "APPROVED" => Ok(BorrowStatus::Approved),
            "ISSUED" => Ok(BorrowStatus::Issued),
            "RETURNED" => Ok(BorrowStatus::Returned),
            "REJECTED" => Ok(BorrowStatus::Rejected),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

impl std::str::FromStr for DecisionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(DecisionAction::Approve),
            "reject" => Ok(DecisionAction::Reject),
            "issue" => Ok(DecisionAction::Issue),
            "return" => Ok(DecisionAction::Return),
            _ => Err(format!("Unknown decision: {}", s)),
        }
    }
}

// Stored as VARCHAR
impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Borrow request snapshot as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub id: i64,
    pub equipment_id: i64,
    pub requester_id: i64,
    #[schema(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end_date: NaiveDate,
    pub qty: i32,
    pub status: BorrowStatus,
    /// Set when the request is rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Time of the last transition
    pub updated_at: DateTime<Utc>,
}

/// Create borrow request payload
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBorrowRequest {
    pub equipment_id: i64,
    /// YYYY-MM-DD
    pub start_date: String,
    /// YYYY-MM-DD
    pub end_date: String,
    /// Defaults to 1
    #[validate(range(min = 1, message = "qty must be at least 1"))]
    pub qty: Option<i32>,
}

/// Validated request ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrowRequest {
    pub equipment_id: i64,
    pub requester_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub qty: i32,
}

impl CreateBorrowRequest {
    /// Check quantities and dates and bind the request to its requester
    pub fn into_new(self, requester_id: i64) -> AppResult<NewBorrowRequest> {
        self.validate()?;

        let start_date = parse_date("startDate", &self.start_date)?;
        let end_date = parse_date("endDate", &self.end_date)?;
        if start_date > end_date {
            return Err(AppError::Validation(format!(
                "startDate {} is after endDate {}",
                start_date, end_date
            )));
        }

        Ok(NewBorrowRequest {
            equipment_id: self.equipment_id,
            requester_id,
            start_date,
            end_date,
            qty: self.qty.unwrap_or(1),
        })
    }
}

fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{} must be YYYY-MM-DD, got '{}'", field, value)))
}

/// Status change applied by the lifecycle engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: BorrowStatus,
    pub decision_message: Option<String>,
    pub at: DateTime<Utc>,
    /// Hand the request's units back in the same unit of work
    pub release: bool,
}

/// Optional decision payload
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct DecisionInput {
    #[validate(length(max = 1024, message = "message too long"))]
    pub message: Option<String>,
}

/// Request listing parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RequestListQuery {
    /// Restrict staff listings to the caller's own requests
    #[serde(default)]
    pub mine: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [BorrowStatus; 5] = [
        BorrowStatus::Pending,
        BorrowStatus::Approved,
        BorrowStatus::Issued,
        BorrowStatus::Returned,
        BorrowStatus::Rejected,
    ];

    const ALL_ACTIONS: [DecisionAction; 4] = [
        DecisionAction::Approve,
        DecisionAction::Reject,
        DecisionAction::Issue,
        DecisionAction::Return,
    ];

    fn payload(start: &str, end: &str, qty: Option<i32>) -> CreateBorrowRequest {
        CreateBorrowRequest {
            equipment_id: 7,
            start_date: start.to_string(),
            end_date: end.to_string(),
            qty,
        }
    }

    #[test]
    fn test_transition_table_has_exactly_four_edges() {
        let legal: Vec<_> = ALL_STATUSES
            .iter()
            .flat_map(|s| ALL_ACTIONS.iter().filter_map(move |a| s.apply(*a).map(|n| (*s, *a, n))))
            .collect();

        assert_eq!(
            legal,
            vec![
                (BorrowStatus::Pending, DecisionAction::Approve, BorrowStatus::Approved),
                (BorrowStatus::Pending, DecisionAction::Reject, BorrowStatus::Rejected),
                (BorrowStatus::Approved, DecisionAction::Issue, BorrowStatus::Issued),
                (BorrowStatus::Issued, DecisionAction::Return, BorrowStatus::Returned),
            ]
        );
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for status in ALL_STATUSES.iter().filter(|s| s.is_terminal()) {
            assert!(!status.holds_reservation());
            for action in ALL_ACTIONS {
                assert_eq!(status.apply(action), None);
            }
        }
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&BorrowStatus::Pending).unwrap(), "\"PENDING\"");
        assert_eq!("issued".parse::<BorrowStatus>().unwrap(), BorrowStatus::Issued);
        assert_eq!("Return".parse::<DecisionAction>().unwrap(), DecisionAction::Return);
        assert!("cancel".parse::<DecisionAction>().is_err());
    }

    #[test]
    fn test_into_new_defaults_qty() {
        let new = payload("2025-03-01", "2025-03-01", None).into_new(3).unwrap();
        assert_eq!(new.qty, 1);
        assert_eq!(new.requester_id, 3);
        assert_eq!(new.start_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    }

    #[test]
    fn test_into_new_rejects_bad_input() {
        for bad in [
            payload("2025-03-05", "2025-03-01", Some(1)),
            payload("03/01/2025", "2025-03-02", Some(1)),
            payload("2025-02-30", "2025-03-02", Some(1)),
            payload("2025-03-01", "2025-03-02", Some(0)),
            payload("2025-03-01", "2025-03-02", Some(-2)),
        ] {
            assert!(matches!(bad.into_new(1), Err(AppError::Validation(_))));
        }
    }

    #[test]
    fn test_snapshot_omits_missing_message() {
        let now = Utc::now();
        let request = BorrowRequest {
            id: 1,
            equipment_id: 2,
            requester_id: 3,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            qty: 1,
            status: BorrowStatus::Pending,
            decision_message: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["equipmentId"], 2);
        assert_eq!(json["startDate"], "2025-01-01");
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("decisionMessage").is_none());
    }
}
