//! Request/response DTOs for the HTTP API.
//!
//! Wire shapes follow the loyalty API contract: monetary amounts are
//! decimal floats, timestamps are RFC 3339, and `accrual` is omitted for
//! orders without a final amount.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loyalty_core::{Order, OrderStatus, Points, Withdrawal};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    pub uploaded_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        OrderResponse {
            number: order.number.clone(),
            status: order.status.as_str(),
            accrual: match order.status {
                OrderStatus::Processed => Some(order.accrual),
                _ => None,
            },
            uploaded_at: rfc3339(order.uploaded_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub current: Points,
    pub withdrawn: Points,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Points,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: Points,
    pub processed_at: String,
}

impl From<&Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: &Withdrawal) -> Self {
        WithdrawalResponse {
            order: withdrawal.order_number.clone(),
            sum: withdrawal.sum,
            processed_at: rfc3339(withdrawal.processed_at),
        }
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
