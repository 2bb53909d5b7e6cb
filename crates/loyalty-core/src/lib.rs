//! loyalty-core
//!
//! Domain types and ports for the loyalty order system.
//!
//! Pure logic only: no IO, no runtime, no transport. The Postgres adapter
//! lives in `loyalty-db`, the HTTP accrual adapter in `loyalty-accrual`,
//! and the reconciliation engine in `loyalty-engine`.

pub mod accrual;
pub mod luhn;
pub mod order;
pub mod points;
pub mod store;

pub use accrual::{AccrualClient, AccrualError, AccrualReply, AccrualStatus};
pub use order::{Order, OrderStatus, User, Withdrawal};
pub use points::Points;
pub use store::{NewOrder, Store, StoreError};
