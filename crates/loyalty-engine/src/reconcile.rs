//! Single-shot verdict application.
//!
//! # Monotonicity
//!
//! The worker can observe accrual events out of order: a PROCESSING reply
//! may arrive after a racing reconciliation already applied PROCESSED.
//! Every application therefore re-reads the stored status before writing,
//! and writes are monotonic with respect to terminality:
//!
//! - an interim verdict only ever advances `NEW → PROCESSING`;
//! - a terminal verdict is applied once: if the stored status is already
//!   terminal the application is a silent no-op;
//! - the store refuses terminal overwrites as well, so even a lost race
//!   between the re-read and the write cannot rewrite history.

use loyalty_core::{
    AccrualClient, AccrualError, AccrualStatus, OrderStatus, Points, Store, StoreError,
};

// ---------------------------------------------------------------------------
// ReconcileError
// ---------------------------------------------------------------------------

/// A reconciliation attempt that could not reach a conclusion. Always
/// transient from the caller's point of view: the order stays pending and
/// the next poll tick retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    Accrual(AccrualError),
    Store(StoreError),
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accrual(e) => write!(f, "accrual lookup failed: {e}"),
            Self::Store(e) => write!(f, "store access failed: {e}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

impl From<AccrualError> for ReconcileError {
    fn from(e: AccrualError) -> Self {
        Self::Accrual(e)
    }
}

impl From<StoreError> for ReconcileError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// reconcile_order
// ---------------------------------------------------------------------------

/// Query the accrual service once for `number` and apply the resulting
/// state transition to the store.
///
/// Returns `Ok(true)` when the order is in a terminal state afterwards
/// (whether this call put it there or it already was), `Ok(false)` when a
/// verdict is still outstanding.
///
/// # Errors
/// Accrual or store failures. Neither is a verdict; callers keep the
/// order pending and retry later.
pub async fn reconcile_order(
    store: &dyn Store,
    accrual: &dyn AccrualClient,
    number: &str,
) -> Result<bool, ReconcileError> {
    let reply = accrual.order_status(number).await?;

    match reply.status {
        // Not started yet: stays pending, no store write.
        AccrualStatus::Registered => Ok(false),

        AccrualStatus::Processing => {
            let order = store.order_by_number(number).await?;
            if order.status == OrderStatus::New {
                store
                    .update_order(number, OrderStatus::Processing, Points::ZERO)
                    .await?;
            }
            // Anything past NEW keeps its current status; a stale
            // PROCESSING reply must not step on it.
            Ok(order.status.is_terminal())
        }

        AccrualStatus::Invalid | AccrualStatus::Processed => {
            let order = store.order_by_number(number).await?;
            if order.status.is_terminal() {
                return Ok(true);
            }
            let (status, amount) = match reply.status {
                AccrualStatus::Processed => (OrderStatus::Processed, reply.accrual),
                _ => (OrderStatus::Invalid, Points::ZERO),
            };
            store.update_order(number, status, amount).await?;
            Ok(true)
        }
    }
}
