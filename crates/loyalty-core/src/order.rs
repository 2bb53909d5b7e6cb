//! Order, withdrawal, and user records.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::points::Points;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an uploaded order.
///
/// Created as `New` by upload; moved to `Processing` or a terminal state
/// only by reconciliation. Once terminal (`Processed` / `Invalid`) the
/// status and accrual amount never change again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Uploaded, no verdict from the accrual service yet.
    New,
    /// The accrual service has started working on the order.
    Processing,
    /// Rejected by the accrual service. **Terminal.**
    Invalid,
    /// Accepted; the accrual amount is final. **Terminal.**
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(OrderStatus::New),
            "PROCESSING" => Some(OrderStatus::Processing),
            "INVALID" => Some(OrderStatus::Invalid),
            "PROCESSED" => Some(OrderStatus::Processed),
            _ => None,
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A loyalty-program order as stored.
///
/// `number` is globally unique across all users; `user_id` is immutable
/// after creation. `accrual` is meaningful only when `status` is
/// [`OrderStatus::Processed`].
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub accrual: Points,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A completed withdrawal, charged against `order_number`.
///
/// At most one withdrawal exists per order number (store uniqueness
/// constraint). Never updated or deleted.
#[derive(Clone, Debug, PartialEq)]
pub struct Withdrawal {
    pub order_number: String,
    pub user_id: Uuid,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
}

/// A registered user account.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub password_hash: String,
    pub password_salt: String,
}
