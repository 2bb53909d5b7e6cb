//! Scripted `AccrualClient` implementation.
//!
//! Replies are queued per order number; each lookup pops the next entry,
//! and the final entry is sticky (repeated forever), which matches how a
//! real order's status evolves and then settles. Orders with no script
//! behave as not-yet-registered (status 204 error). Lookups are counted
//! so tests can assert polling stopped.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use loyalty_core::{AccrualClient, AccrualError, AccrualReply, AccrualStatus, Points};

type Scripted = Result<AccrualReply, AccrualError>;

#[derive(Default)]
struct Inner {
    scripts: HashMap<String, VecDeque<Scripted>>,
    calls: HashMap<String, usize>,
}

/// Deterministic scripted accrual service.
#[derive(Default)]
pub struct ScriptedAccrual {
    inner: Mutex<Inner>,
}

impl ScriptedAccrual {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reply to the script for `number`.
    pub fn push(&self, number: &str, reply: Scripted) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .entry(number.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Script a successful status reply.
    pub fn push_status(&self, number: &str, status: AccrualStatus, accrual: Points) {
        self.push(number, Ok(AccrualReply { status, accrual }));
    }

    /// Script a transport-level failure.
    pub fn push_error(&self, number: &str, error: AccrualError) {
        self.push(number, Err(error));
    }

    /// How many lookups were made for `number`.
    pub fn calls(&self, number: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .get(number)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl AccrualClient for ScriptedAccrual {
    async fn order_status(&self, number: &str) -> Result<AccrualReply, AccrualError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.calls.entry(number.to_string()).or_insert(0) += 1;

        match inner.scripts.get_mut(number) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("non-empty queue"),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or(Err(AccrualError::Status(204))),
            None => Err(AccrualError::Status(204)),
        }
    }
}
