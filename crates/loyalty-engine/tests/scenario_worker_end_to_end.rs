use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use loyalty_core::{AccrualStatus, OrderStatus, Points, Store};
use loyalty_engine::{ReconcileWorker, WorkerConfig};
use loyalty_testkit::{MemoryStore, ScriptedAccrual};

// The poll interval is several times the observer's sampling period so
// every interim status is visible to `wait_for_status` before the next
// tick replaces it.
fn fast_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(40),
        queue_capacity: 100,
    }
}

async fn wait_for_status(store: &MemoryStore, number: &str, want: OrderStatus) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if store.order_by_number(number).await.unwrap().status == want {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {number} to reach {want:?}"
        );
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn scenario_order_walks_new_processing_processed_and_lands_in_balance() {
    let store = Arc::new(MemoryStore::new());
    let accrual = Arc::new(ScriptedAccrual::new());
    let user = store.seed_user("alice");
    let amount = Points::new(500_000_000);

    // Seeded from the store at startup: the order predates the worker.
    store.seed_order("79927398713", user, OrderStatus::New, Points::ZERO);
    accrual.push_status("79927398713", AccrualStatus::Registered, Points::ZERO);
    accrual.push_status("79927398713", AccrualStatus::Processing, Points::ZERO);
    accrual.push_status("79927398713", AccrualStatus::Processed, amount);

    let handle = ReconcileWorker::spawn(store.clone(), accrual.clone(), fast_config())
        .await
        .unwrap();

    wait_for_status(&store, "79927398713", OrderStatus::Processing).await;
    wait_for_status(&store, "79927398713", OrderStatus::Processed).await;

    let order = store.order_by_number("79927398713").await.unwrap();
    assert_eq!(order.accrual, amount);
    assert_eq!(store.balance(user).await.unwrap(), amount);

    // Settled orders leave the pending set: polling for this number stops.
    let calls_at_settle = accrual.calls("79927398713");
    sleep(Duration::from_millis(120)).await;
    assert_eq!(
        accrual.calls("79927398713"),
        calls_at_settle,
        "settled order must not be polled again"
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn scenario_enqueued_orders_merge_into_the_pending_set() {
    let store = Arc::new(MemoryStore::new());
    let accrual = Arc::new(ScriptedAccrual::new());
    let user = store.seed_user("alice");
    let amount = Points::new(300_000_000);

    let handle = ReconcileWorker::spawn(store.clone(), accrual.clone(), fast_config())
        .await
        .unwrap();
    let queue = handle.queue();

    // The order appears after the worker started; only the channel can
    // deliver it.
    store.seed_order("12345678903", user, OrderStatus::New, Points::ZERO);
    accrual.push_status("12345678903", AccrualStatus::Processed, amount);
    queue.enqueue("12345678903");

    wait_for_status(&store, "12345678903", OrderStatus::Processed).await;
    assert_eq!(store.balance(user).await.unwrap(), amount);

    handle.shutdown().await;
}

#[tokio::test]
async fn scenario_shutdown_leaves_unresolved_work_for_the_next_startup() {
    let store = Arc::new(MemoryStore::new());
    let accrual = Arc::new(ScriptedAccrual::new());
    let user = store.seed_user("alice");

    // Never resolves while the first worker is alive.
    store.seed_order("79927398713", user, OrderStatus::New, Points::ZERO);
    accrual.push_status("79927398713", AccrualStatus::Registered, Points::ZERO);

    let handle = ReconcileWorker::spawn(store.clone(), accrual.clone(), fast_config())
        .await
        .unwrap();
    sleep(Duration::from_millis(60)).await;
    handle.shutdown().await;

    // Still NEW in the store; a fresh worker re-seeds it and, with the
    // verdict now final, settles it.
    assert_eq!(
        store.order_by_number("79927398713").await.unwrap().status,
        OrderStatus::New
    );
    accrual.push_status("79927398713", AccrualStatus::Processed, Points::new(1_000_000));

    let handle = ReconcileWorker::spawn(store.clone(), accrual.clone(), fast_config())
        .await
        .unwrap();
    wait_for_status(&store, "79927398713", OrderStatus::Processed).await;
    handle.shutdown().await;
}
