//! loyalty-engine
//!
//! The Order Reconciliation Engine:
//!
//! - [`reconcile::reconcile_order`]: one idempotent verdict application.
//!   query the accrual service once, apply the resulting transition to
//!   stored order state, report whether the order is settled.
//! - [`worker::ReconcileWorker`]: the single background task that owns
//!   the pending set, polls on an interval, and absorbs enqueued numbers
//!   through a channel.
//! - [`service::OrderService`]: the public operations (upload, list,
//!   balance, withdraw, withdrawals) built atop the store and the worker.

pub mod reconcile;
pub mod service;
pub mod worker;

pub use reconcile::{reconcile_order, ReconcileError};
pub use service::{OrderError, OrderService, WithdrawalPolicy};
pub use worker::{OrderQueue, ReconcileWorker, WorkerConfig, WorkerHandle};
