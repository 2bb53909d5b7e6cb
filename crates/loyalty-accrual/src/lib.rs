//! loyalty-accrual
//!
//! HTTP adapter for the [`AccrualClient`] port: a thin read-only client
//! for the external accrual service (`GET {base}/api/orders/{number}`).
//!
//! Contract notes:
//! - Only a `200 OK` with a decodable JSON body counts as an answer.
//!   Everything else (transport failure, non-200, undecodable body) is
//!   an [`AccrualError`] and must never be treated as a terminal verdict.
//! - The request timeout lives here, on the transport; callers do not
//!   impose their own.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use loyalty_core::{AccrualClient, AccrualError, AccrualReply, AccrualStatus, Points};

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// JSON body of a 200 reply: `{"order": "...", "status": "...",
/// "accrual": 500.5}`. `accrual` is present only for PROCESSED orders.
#[derive(Debug, Deserialize)]
struct WireReply {
    status: AccrualStatus,
    #[serde(default)]
    accrual: Option<Points>,
}

impl From<WireReply> for AccrualReply {
    fn from(wire: WireReply) -> Self {
        AccrualReply {
            status: wire.status,
            accrual: wire.accrual.unwrap_or(Points::ZERO),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpAccrualClient
// ---------------------------------------------------------------------------

/// Live HTTP client for the accrual service.
pub struct HttpAccrualClient {
    base: String,
    http: reqwest::Client,
}

impl HttpAccrualClient {
    /// Build a client for the service at `base_url` (scheme + authority,
    /// e.g. `http://localhost:8080`). A trailing slash is tolerated.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn order_status(&self, number: &str) -> Result<AccrualReply, AccrualError> {
        let url = format!("{}/api/orders/{}", self.base, number);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AccrualError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            // Includes 204 "not registered": no payload, no verdict.
            return Err(AccrualError::Status(status.as_u16()));
        }

        let wire: WireReply = response
            .json()
            .await
            .map_err(|e| AccrualError::Malformed(e.to_string()))?;
        Ok(wire.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn decode(json: &str) -> AccrualReply {
        let wire: WireReply = serde_json::from_str(json).expect("decode");
        wire.into()
    }

    #[test]
    fn decodes_processed_reply_with_amount() {
        let reply = decode(r#"{"order":"79927398713","status":"PROCESSED","accrual":729.98}"#);
        assert_eq!(reply.status, AccrualStatus::Processed);
        assert_eq!(reply.accrual, Points::new(729_980_000));
    }

    #[test]
    fn decodes_interim_reply_without_amount() {
        let reply = decode(r#"{"order":"79927398713","status":"PROCESSING"}"#);
        assert_eq!(reply.status, AccrualStatus::Processing);
        assert_eq!(reply.accrual, Points::ZERO);
    }

    #[test]
    fn rejects_unknown_status_vocabulary() {
        let res: Result<WireReply, _> = serde_json::from_str(r#"{"status":"DONE"}"#);
        assert!(res.is_err());
    }

    /// Serve exactly one canned HTTP response on an ephemeral port.
    async fn serve_once(response: String) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn http_200_reply_is_decoded() {
        let base = serve_once(http_response(
            "200 OK",
            r#"{"order":"42","status":"PROCESSED","accrual":500.0}"#,
        ))
        .await;

        let client = HttpAccrualClient::new(&base).expect("client");
        let reply = client.order_status("42").await.expect("reply");
        assert_eq!(reply.status, AccrualStatus::Processed);
        assert_eq!(reply.accrual, Points::new(500_000_000));
    }

    #[tokio::test]
    async fn http_500_is_an_error_not_a_verdict() {
        let base = serve_once(http_response("500 Internal Server Error", "")).await;

        let client = HttpAccrualClient::new(&base).expect("client");
        let err = client.order_status("42").await.expect_err("must fail");
        assert_eq!(err, AccrualError::Status(500));
    }

    #[tokio::test]
    async fn http_204_is_an_error_not_a_verdict() {
        let base = serve_once(
            "HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n".to_string(),
        )
        .await;

        let client = HttpAccrualClient::new(&base).expect("client");
        let err = client.order_status("42").await.expect_err("must fail");
        assert_eq!(err, AccrualError::Status(204));
    }
}
