use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use loyalty_core::{AccrualError, AccrualStatus, OrderStatus, Points, Store};
use loyalty_engine::{ReconcileWorker, WorkerConfig};
use loyalty_testkit::{MemoryStore, ScriptedAccrual};

#[tokio::test]
async fn scenario_one_failing_order_neither_leaves_pending_nor_stalls_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let accrual = Arc::new(ScriptedAccrual::new());
    let user = store.seed_user("alice");

    // "11111111" fails on every lookup; "79927398713" settles normally.
    // The failing order is seeded first, so it errors ahead of the good
    // one inside the same reconciliation pass.
    store.seed_order("11111111", user, OrderStatus::New, Points::ZERO);
    store.seed_order("79927398713", user, OrderStatus::New, Points::ZERO);
    accrual.push_error(
        "11111111",
        AccrualError::Transport("connection refused".into()),
    );
    accrual.push_status(
        "79927398713",
        AccrualStatus::Processed,
        Points::new(500_000_000),
    );

    let handle = ReconcileWorker::spawn(
        store.clone(),
        accrual.clone(),
        WorkerConfig {
            poll_interval: Duration::from_millis(20),
            queue_capacity: 100,
        },
    )
    .await
    .unwrap();

    // The healthy order settles despite its neighbor failing.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if store.order_by_number("79927398713").await.unwrap().status == OrderStatus::Processed {
            break;
        }
        assert!(Instant::now() < deadline, "healthy order never settled");
        sleep(Duration::from_millis(10)).await;
    }

    // The failing order stays NEW and stays pending: the worker keeps
    // retrying it tick after tick.
    let calls_so_far = accrual.calls("11111111");
    assert!(calls_so_far >= 1);
    sleep(Duration::from_millis(100)).await;
    assert!(
        accrual.calls("11111111") > calls_so_far,
        "errored order must be retried on later ticks"
    );
    assert_eq!(
        store.order_by_number("11111111").await.unwrap().status,
        OrderStatus::New,
        "a transport failure is never a verdict"
    );

    handle.shutdown().await;
}
