//! loyalty-testkit
//!
//! Deterministic in-memory collaborators for tests: a [`MemoryStore`]
//! implementing the `Store` port and a [`ScriptedAccrual`] client whose
//! replies are queued up front. No network I/O, no randomness.

mod memory_store;
mod scripted_accrual;

pub use memory_store::MemoryStore;
pub use scripted_accrual::ScriptedAccrual;
