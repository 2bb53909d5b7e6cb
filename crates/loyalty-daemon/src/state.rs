//! Shared runtime state for the daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from axum; everything inside
//! is a cheap handle, so the state clones freely.

use loyalty_engine::OrderService;
use serde::Serialize;

use crate::auth::AuthService;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Handle shared across all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: OrderService,
    pub auth: AuthService,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(service: OrderService, auth: AuthService) -> Self {
        Self {
            service,
            auth,
            build: BuildInfo {
                service: "loyalty-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}
