//! loyalty-daemon
//!
//! Thin HTTP surface over the reconciliation engine: axum router, token
//! auth, configuration, and process bootstrap. All business rules live in
//! `loyalty-engine`; handlers only translate between HTTP and the
//! service's error vocabulary.

pub mod api_types;
pub mod auth;
pub mod config;
pub mod routes;
pub mod state;
