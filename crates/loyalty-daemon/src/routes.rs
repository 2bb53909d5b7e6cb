//! Axum router and all HTTP handlers.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers afterwards, so the scenario tests in
//! `tests/` can compose the bare router.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::warn;

use loyalty_engine::OrderError;

use crate::api_types::{
    AuthRequest, BalanceResponse, ErrorResponse, HealthResponse, OrderResponse, TokenResponse,
    WithdrawRequest, WithdrawalResponse,
};
use crate::auth::{AuthError, AuthUser};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (request tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/user/register", post(register))
        .route("/api/user/login", post(login))
        .route("/api/user/orders", post(upload_order).get(order_list))
        .route("/api/user/balance", get(balance))
        .route("/api/user/balance/withdraw", post(withdraw))
        .route("/api/user/withdrawals", get(withdrawals))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /api/user/register
// ---------------------------------------------------------------------------

pub(crate) async fn register(
    State(st): State<Arc<AppState>>,
    Json(req): Json<AuthRequest>,
) -> Response {
    match st.auth.register(&req.login, &req.password).await {
        Ok(token) => token_response(token),
        Err(e) => auth_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /api/user/login
// ---------------------------------------------------------------------------

pub(crate) async fn login(
    State(st): State<Arc<AppState>>,
    Json(req): Json<AuthRequest>,
) -> Response {
    match st.auth.login(&req.login, &req.password).await {
        Ok(token) => token_response(token),
        Err(e) => auth_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /api/user/orders  (text body = order number)
// ---------------------------------------------------------------------------

pub(crate) async fn upload_order(
    State(st): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: String,
) -> Response {
    let number = body.trim();
    if number.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "request has no order number");
    }
    match st.service.upload_order(user_id, number).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => order_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /api/user/orders
// ---------------------------------------------------------------------------

pub(crate) async fn order_list(
    State(st): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Response {
    match st.service.order_list(user_id).await {
        Ok(orders) if orders.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(orders) => {
            let body: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => order_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /api/user/balance
// ---------------------------------------------------------------------------

pub(crate) async fn balance(
    State(st): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Response {
    match st.service.balance(user_id).await {
        Ok((current, withdrawn)) => (
            StatusCode::OK,
            Json(BalanceResponse { current, withdrawn }),
        )
            .into_response(),
        Err(e) => order_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /api/user/balance/withdraw
// ---------------------------------------------------------------------------

pub(crate) async fn withdraw(
    State(st): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<WithdrawRequest>,
) -> Response {
    match st.service.withdraw(user_id, &req.order, req.sum).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => order_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /api/user/withdrawals
// ---------------------------------------------------------------------------

pub(crate) async fn withdrawals(
    State(st): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Response {
    match st.service.withdrawals(user_id).await {
        Ok(list) if list.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(list) => {
            let body: Vec<WithdrawalResponse> =
                list.iter().map(WithdrawalResponse::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => order_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn token_response(token: String) -> Response {
    (
        StatusCode::OK,
        [(header::AUTHORIZATION, token.clone())],
        Json(TokenResponse { token }),
    )
        .into_response()
}

fn error_response(code: StatusCode, message: &str) -> Response {
    (
        code,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn auth_error_response(e: AuthError) -> Response {
    match e {
        AuthError::LoginAlreadyExists => error_response(StatusCode::CONFLICT, &e.to_string()),
        AuthError::LoginIsEmpty | AuthError::PasswordTooShort => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        AuthError::InvalidLoginOrPassword => {
            error_response(StatusCode::UNAUTHORIZED, &e.to_string())
        }
        AuthError::Store(err) => {
            warn!(error = %err, "auth store failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

fn order_error_response(e: OrderError) -> Response {
    match e {
        // Success-shaped: the order is already on this user's account.
        OrderError::AlreadyUploadedBySelf => error_response(StatusCode::OK, &e.to_string()),
        OrderError::AlreadyUploadedByOther => error_response(StatusCode::CONFLICT, &e.to_string()),
        OrderError::InvalidOrderNumber | OrderError::InvalidWithdrawalSum => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
        }
        OrderError::InsufficientFunds => {
            error_response(StatusCode::PAYMENT_REQUIRED, &e.to_string())
        }
        OrderError::WithdrawAlreadyExists => error_response(StatusCode::CONFLICT, &e.to_string()),
        OrderError::Store(err) => {
            warn!(error = %err, "store failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}
