//! The `AccrualClient` port: read-only lookup against the external
//! accrual service, the sole authority on whether an order earns points.

use async_trait::async_trait;
use serde::Deserialize;

use crate::points::Points;

// ---------------------------------------------------------------------------
// AccrualStatus
// ---------------------------------------------------------------------------

/// Status vocabulary of the external accrual service.
///
/// `Registered` and `Processing` are interim; `Invalid` and `Processed`
/// are final verdicts. The engine maps these onto its own
/// [`OrderStatus`](crate::OrderStatus) vocabulary during reconciliation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// Registered with the service; calculation not started.
    Registered,
    /// Calculation in progress.
    Processing,
    /// Order rejected; no points will be accrued.
    Invalid,
    /// Calculation finished; the accrual amount is final.
    Processed,
}

impl AccrualStatus {
    /// `true` for statuses that end reconciliation of an order.
    pub fn is_final(&self) -> bool {
        matches!(self, AccrualStatus::Invalid | AccrualStatus::Processed)
    }
}

// ---------------------------------------------------------------------------
// AccrualReply
// ---------------------------------------------------------------------------

/// One successful lookup result. `accrual` is zero unless `status` is
/// [`AccrualStatus::Processed`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AccrualReply {
    pub status: AccrualStatus,
    pub accrual: Points,
}

// ---------------------------------------------------------------------------
// AccrualError
// ---------------------------------------------------------------------------

/// A failed lookup. Never a verdict: callers must keep the order pending
/// and retry on a later poll tick, not mark it INVALID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccrualError {
    /// The service answered with a non-200 status.
    Status(u16),
    /// The request could not be completed (connect/timeout/etc.).
    Transport(String),
    /// A 200 reply carried a body we could not decode.
    Malformed(String),
}

impl std::fmt::Display for AccrualError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(code) => write!(f, "accrual service replied with status {code}"),
            Self::Transport(msg) => write!(f, "accrual request failed: {msg}"),
            Self::Malformed(msg) => write!(f, "accrual reply malformed: {msg}"),
        }
    }
}

impl std::error::Error for AccrualError {}

// ---------------------------------------------------------------------------
// AccrualClient
// ---------------------------------------------------------------------------

/// Read-only lookup by order number.
#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn order_status(&self, number: &str) -> Result<AccrualReply, AccrualError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finality() {
        assert!(!AccrualStatus::Registered.is_final());
        assert!(!AccrualStatus::Processing.is_final());
        assert!(AccrualStatus::Invalid.is_final());
        assert!(AccrualStatus::Processed.is_final());
    }
}
