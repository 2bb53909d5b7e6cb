//! Public order operations: upload, list, balance, withdraw, withdrawals.
//!
//! Balance and withdrawal operations talk to the store directly; only
//! `upload_order` touches the reconciliation machinery, and even there the
//! outcome is never awaited; the response goes out as soon as the order
//! row exists.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use loyalty_core::{luhn, AccrualClient, NewOrder, Order, Points, Store, StoreError, Withdrawal};

use crate::reconcile::reconcile_order;
use crate::worker::OrderQueue;

// ---------------------------------------------------------------------------
// OrderError
// ---------------------------------------------------------------------------

/// Everything the order operations can report.
///
/// `AlreadyUploadedBySelf` is success-shaped: callers surface it with a
/// 200-class response; the remaining conflict variants are real
/// conflicts. `Store` wraps transient infrastructure failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderError {
    /// Empty or Luhn-invalid order number.
    InvalidOrderNumber,
    /// Withdrawal sum is zero or negative.
    InvalidWithdrawalSum,
    /// This user already uploaded this order number.
    AlreadyUploadedBySelf,
    /// A different user owns this order number.
    AlreadyUploadedByOther,
    /// Withdrawal sum exceeds the current balance.
    InsufficientFunds,
    /// A withdrawal against this order number already exists.
    WithdrawAlreadyExists,
    /// Transient store failure.
    Store(StoreError),
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOrderNumber => write!(f, "invalid order number"),
            Self::InvalidWithdrawalSum => write!(f, "withdrawal sum must be positive"),
            Self::AlreadyUploadedBySelf => write!(f, "order already uploaded by this user"),
            Self::AlreadyUploadedByOther => write!(f, "order already uploaded by another user"),
            Self::InsufficientFunds => write!(f, "not enough points on the account"),
            Self::WithdrawAlreadyExists => {
                write!(f, "withdrawal for this order already exists")
            }
            Self::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for OrderError {}

// ---------------------------------------------------------------------------
// WithdrawalPolicy
// ---------------------------------------------------------------------------

/// Whether withdrawal target numbers must pass the Luhn check. The
/// reference behavior only requires non-empty targets, so the default is
/// off; deployments wanting symmetric validation flip it on.
#[derive(Clone, Copy, Debug, Default)]
pub struct WithdrawalPolicy {
    pub require_luhn: bool,
}

// ---------------------------------------------------------------------------
// OrderService
// ---------------------------------------------------------------------------

/// The public surface of the engine. Cheap to clone; all fields are
/// handles.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    accrual: Arc<dyn AccrualClient>,
    queue: OrderQueue,
    policy: WithdrawalPolicy,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        accrual: Arc<dyn AccrualClient>,
        queue: OrderQueue,
        policy: WithdrawalPolicy,
    ) -> Self {
        Self {
            store,
            accrual,
            queue,
            policy,
        }
    }

    /// Register an order number for the user and hand it to reconciliation.
    ///
    /// Succeeds as soon as the order row exists; the accrual verdict is
    /// resolved asynchronously and its failure is only ever observable
    /// through later polls, never through this call.
    pub async fn upload_order(&self, user_id: Uuid, number: &str) -> Result<(), OrderError> {
        if !luhn::is_valid(number) {
            return Err(OrderError::InvalidOrderNumber);
        }

        match self.store.order_by_number(number).await {
            Ok(existing) => Err(Self::classify_owner(&existing, user_id)),
            Err(StoreError::OrderNotFound) => {
                let order = NewOrder {
                    number: number.to_string(),
                    user_id,
                    uploaded_at: Utc::now(),
                };
                match self.store.create_order(&order).await {
                    Ok(()) => {
                        self.spawn_first_attempt(order.number);
                        Ok(())
                    }
                    // Lost a creation race; classify against the winner.
                    Err(StoreError::DuplicateOrder) => {
                        let existing = self
                            .store
                            .order_by_number(number)
                            .await
                            .map_err(OrderError::Store)?;
                        Err(Self::classify_owner(&existing, user_id))
                    }
                    Err(e) => Err(OrderError::Store(e)),
                }
            }
            Err(e) => Err(OrderError::Store(e)),
        }
    }

    fn classify_owner(existing: &Order, user_id: Uuid) -> OrderError {
        if existing.user_id == user_id {
            OrderError::AlreadyUploadedBySelf
        } else {
            OrderError::AlreadyUploadedByOther
        }
    }

    /// Fire-and-forget: one immediate reconcile attempt for a fresh
    /// order; anything short of a terminal verdict lands in the worker
    /// queue.
    fn spawn_first_attempt(&self, number: String) {
        let store = Arc::clone(&self.store);
        let accrual = Arc::clone(&self.accrual);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            match reconcile_order(store.as_ref(), accrual.as_ref(), &number).await {
                Ok(true) => {}
                Ok(false) => queue.enqueue(number),
                Err(e) => {
                    debug!(%number, error = %e, "first reconcile attempt failed");
                    queue.enqueue(number);
                }
            }
        });
    }

    /// All orders of the user, ascending by upload time.
    pub async fn order_list(&self, user_id: Uuid) -> Result<Vec<Order>, OrderError> {
        self.store
            .orders_by_user(user_id)
            .await
            .map_err(OrderError::Store)
    }

    /// `(balance, withdrawn)`, two independent ledger aggregations.
    pub async fn balance(&self, user_id: Uuid) -> Result<(Points, Points), OrderError> {
        let balance = self
            .store
            .balance(user_id)
            .await
            .map_err(OrderError::Store)?;
        let withdrawn = self
            .store
            .withdrawn_total(user_id)
            .await
            .map_err(OrderError::Store)?;
        Ok((balance, withdrawn))
    }

    /// Charge `sum` points against `order_number`.
    ///
    /// The pre-read of the balance only shapes the error for the common
    /// case; the store's atomic check-and-insert is what actually
    /// guarantees the balance cannot go negative under concurrency.
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        order_number: &str,
        sum: Points,
    ) -> Result<(), OrderError> {
        if order_number.is_empty() {
            return Err(OrderError::InvalidOrderNumber);
        }
        if self.policy.require_luhn && !luhn::is_valid(order_number) {
            return Err(OrderError::InvalidOrderNumber);
        }
        if !sum.is_positive() {
            return Err(OrderError::InvalidWithdrawalSum);
        }

        let balance = self
            .store
            .balance(user_id)
            .await
            .map_err(OrderError::Store)?;
        if sum > balance {
            return Err(OrderError::InsufficientFunds);
        }

        match self.store.create_withdrawal(user_id, order_number, sum).await {
            Ok(()) => Ok(()),
            Err(StoreError::InsufficientFunds) => Err(OrderError::InsufficientFunds),
            Err(StoreError::WithdrawalExists) => Err(OrderError::WithdrawAlreadyExists),
            Err(e) => Err(OrderError::Store(e)),
        }
    }

    /// All withdrawals of the user, ascending by processed time.
    pub async fn withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, OrderError> {
        self.store
            .withdrawals_by_user(user_id)
            .await
            .map_err(OrderError::Store)
    }
}
