//! The reconciliation worker: a single background task owning the
//! pending set.
//!
//! # Design
//!
//! All mutation of the pending set happens inside one spawned task; the
//! rest of the system reaches it only through a bounded channel
//! ([`OrderQueue`]) and a shutdown signal. The loop selects over three
//! sources and wakes on whichever fires first:
//!
//! - the poll ticker: run one [`reconcile_order`] per pending number,
//!   dropping the ones that settled;
//! - the enqueue channel: merge freshly uploaded numbers into the set;
//! - the shutdown signal: exit without draining; outstanding work is
//!   recovered at next startup from stored order status.
//!
//! A per-order failure is logged and keeps that order pending; it never
//! removes the order and never stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use loyalty_core::{AccrualClient, OrderStatus, Store, StoreError};

use crate::reconcile::reconcile_order;

// ---------------------------------------------------------------------------
// WorkerConfig
// ---------------------------------------------------------------------------

/// Tunables for the worker loop.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Interval between reconciliation passes over the pending set.
    pub poll_interval: Duration,
    /// Capacity of the enqueue channel. Sized to absorb an upload burst;
    /// overflow falls back to a detached waiting send, so enqueuing never
    /// blocks the caller either way.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            queue_capacity: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// OrderQueue
// ---------------------------------------------------------------------------

/// Cloneable enqueue handle to the worker's pending set.
#[derive(Clone)]
pub struct OrderQueue {
    tx: mpsc::Sender<String>,
}

impl OrderQueue {
    /// A queue with no worker behind it, plus the receiving end.
    /// For tests and custom wiring.
    pub fn standalone(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Hand an order number to the worker. Never blocks: the fast path is
    /// `try_send`; when the channel is full the send completes from a
    /// detached task. If the worker is gone the number is dropped; the
    /// order is still NEW in the store and is picked up by the seed query
    /// at next startup.
    pub fn enqueue(&self, number: impl Into<String>) {
        let number = number.into();
        match self.tx.try_send(number) {
            Ok(()) => {}
            Err(TrySendError::Full(number)) => {
                debug!(%number, "enqueue channel full; completing send detached");
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if tx.send(number).await.is_err() {
                        debug!("worker stopped before enqueue completed");
                    }
                });
            }
            Err(TrySendError::Closed(number)) => {
                debug!(%number, "worker stopped; enqueue dropped");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerHandle
// ---------------------------------------------------------------------------

/// Owner handle for a spawned worker: enqueue access plus shutdown.
pub struct WorkerHandle {
    queue: OrderQueue,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Cloneable enqueue handle for the service layer.
    pub fn queue(&self) -> OrderQueue {
        self.queue.clone()
    }

    /// Signal the loop to stop and wait for it to exit. An in-flight
    /// reconciliation pass completes; remaining pending work is dropped
    /// and recovered at next startup.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "worker task did not exit cleanly");
        }
    }
}

// ---------------------------------------------------------------------------
// ReconcileWorker
// ---------------------------------------------------------------------------

/// The background reconciliation loop. Constructed and launched via
/// [`ReconcileWorker::spawn`]; never handled directly.
pub struct ReconcileWorker {
    store: Arc<dyn Store>,
    accrual: Arc<dyn AccrualClient>,
    pending: Vec<String>,
    rx: mpsc::Receiver<String>,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
}

impl ReconcileWorker {
    /// Seed the pending set from orders still awaiting a verdict, then
    /// launch the loop.
    pub async fn spawn(
        store: Arc<dyn Store>,
        accrual: Arc<dyn AccrualClient>,
        config: WorkerConfig,
    ) -> Result<WorkerHandle, StoreError> {
        let pending = store
            .orders_with_status(&[OrderStatus::New, OrderStatus::Processing])
            .await?;
        info!(count = pending.len(), "seeded pending set from store");

        let (queue, rx) = OrderQueue::standalone(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = ReconcileWorker {
            store,
            accrual,
            pending,
            rx,
            shutdown: shutdown_rx,
            poll_interval: config.poll_interval,
        };
        let join = tokio::spawn(worker.run());

        Ok(WorkerHandle {
            queue,
            shutdown: shutdown_tx,
            join,
        })
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("reconcile worker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.reconcile_pending().await;
                }
                received = self.rx.recv() => match received {
                    Some(number) => self.pending.push(number),
                    // All queue handles dropped; nothing can arrive anymore.
                    None => break,
                },
            }
        }
    }

    /// One pass over the pending set. Settled orders leave the set;
    /// errored ones stay for the next tick.
    async fn reconcile_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        debug!(count = self.pending.len(), "reconciliation pass");

        let batch = std::mem::take(&mut self.pending);
        let mut still_pending = Vec::with_capacity(batch.len());
        for number in batch {
            match reconcile_order(self.store.as_ref(), self.accrual.as_ref(), &number).await {
                Ok(true) => info!(%number, "order settled"),
                Ok(false) => still_pending.push(number),
                Err(e) => {
                    warn!(%number, error = %e, "reconcile failed; retrying next tick");
                    still_pending.push(number);
                }
            }
        }
        // Numbers enqueued during the pass are still sitting in the
        // channel and get merged by the select loop afterwards.
        self.pending = still_pending;
    }
}
