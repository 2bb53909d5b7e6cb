//! The `Store` port: durable storage consumed by the engine.
//!
//! Adapters: `loyalty-db` (Postgres) for production, the in-memory store
//! in `loyalty-testkit` for tests. The store is responsible for making
//! single-row writes atomic and [`Store::create_withdrawal`] an atomic
//! check-and-insert; callers never wrap it in their own locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::order::{Order, OrderStatus, User, Withdrawal};
use crate::points::Points;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Everything a store operation can fail with.
///
/// The conflict variants (`LoginTaken`, `DuplicateOrder`,
/// `WithdrawalExists`, `InsufficientFunds`) are part of the contract and
/// drive caller behavior; `Backend` covers transient infrastructure
/// failures (connection loss, query errors) that callers surface as
/// internal errors or retry on the next poll tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// No order with the requested number exists.
    OrderNotFound,
    /// No user with the requested login exists.
    UserNotFound,
    /// A user with this login already exists.
    LoginTaken,
    /// An order with this number already exists.
    DuplicateOrder,
    /// A withdrawal against this order number already exists.
    WithdrawalExists,
    /// The withdrawal sum exceeds the user's current balance.
    InsufficientFunds,
    /// Transient backend failure; safe to retry.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderNotFound => write!(f, "order not found"),
            Self::UserNotFound => write!(f, "user not found"),
            Self::LoginTaken => write!(f, "login already exists"),
            Self::DuplicateOrder => write!(f, "order number already exists"),
            Self::WithdrawalExists => write!(f, "withdrawal for this order already exists"),
            Self::InsufficientFunds => write!(f, "not enough points on the account"),
            Self::Backend(msg) => write!(f, "store backend failure: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// NewOrder
// ---------------------------------------------------------------------------

/// Parameters for creating an order row. Status starts as
/// [`OrderStatus::New`]; the store fills the rest.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub number: String,
    pub user_id: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Durable storage for users, orders, and withdrawals, plus the derived
/// ledger aggregates.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user; returns the generated id.
    ///
    /// # Errors
    /// [`StoreError::LoginTaken`] if the login is already registered.
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<Uuid, StoreError>;

    /// Fetch a user by login.
    ///
    /// # Errors
    /// [`StoreError::UserNotFound`] if no such login exists.
    async fn user_by_login(&self, login: &str) -> Result<User, StoreError>;

    /// Insert a new order in status NEW.
    ///
    /// # Errors
    /// [`StoreError::DuplicateOrder`] if the number is already present
    /// (any owner).
    async fn create_order(&self, order: &NewOrder) -> Result<(), StoreError>;

    /// Fetch an order by its number.
    ///
    /// # Errors
    /// [`StoreError::OrderNotFound`] if the number is unknown.
    async fn order_by_number(&self, number: &str) -> Result<Order, StoreError>;

    /// All orders of a user, ascending by upload time. Empty is fine.
    async fn orders_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;

    /// Overwrite status, accrual, and updated-at of an order by number.
    ///
    /// Rows already in a terminal status are left untouched; terminal
    /// verdicts are immutable at the storage layer, so a racing stale
    /// write degrades to a no-op rather than corrupting the ledger.
    async fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), StoreError>;

    /// Numbers of all orders currently in one of `statuses`, ascending by
    /// upload time. Used once at worker startup to seed the pending set.
    async fn orders_with_status(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<String>, StoreError>;

    /// Current balance: Σ accrual over PROCESSED orders − Σ withdrawal
    /// sums. Computed fresh from the ledger, never cached.
    async fn balance(&self, user_id: Uuid) -> Result<Points, StoreError>;

    /// Lifetime withdrawn total: Σ withdrawal sums.
    async fn withdrawn_total(&self, user_id: Uuid) -> Result<Points, StoreError>;

    /// Atomically check the balance and insert a withdrawal record.
    ///
    /// # Errors
    /// - [`StoreError::InsufficientFunds`] if `sum` exceeds the balance
    ///   observed inside the same atomic step.
    /// - [`StoreError::WithdrawalExists`] if a withdrawal against this
    ///   order number already exists.
    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        order_number: &str,
        sum: Points,
    ) -> Result<(), StoreError>;

    /// All withdrawals of a user, ascending by processed time.
    async fn withdrawals_by_user(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, StoreError>;

    /// Release underlying resources (connection pool). Idempotent.
    async fn close(&self);
}
