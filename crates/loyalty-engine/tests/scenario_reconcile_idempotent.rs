use std::sync::Arc;

use loyalty_core::{AccrualStatus, OrderStatus, Points, Store};
use loyalty_engine::reconcile_order;
use loyalty_testkit::{MemoryStore, ScriptedAccrual};

#[tokio::test]
async fn scenario_second_application_of_a_terminal_verdict_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let accrual = Arc::new(ScriptedAccrual::new());
    let user = store.seed_user("alice");
    let amount = Points::new(500_000_000);

    store.seed_order("79927398713", user, OrderStatus::New, Points::ZERO);
    accrual.push_status("79927398713", AccrualStatus::Processed, amount);

    let resolved = reconcile_order(store.as_ref(), accrual.as_ref(), "79927398713")
        .await
        .unwrap();
    assert!(resolved);

    let settled = store.order_by_number("79927398713").await.unwrap();
    assert_eq!(settled.status, OrderStatus::Processed);
    assert_eq!(settled.accrual, amount);

    // Same verdict applied again: still resolved, exactly one transition
    // in storage: the row (updated_at included) does not move.
    let resolved = reconcile_order(store.as_ref(), accrual.as_ref(), "79927398713")
        .await
        .unwrap();
    assert!(resolved);
    assert_eq!(store.order_by_number("79927398713").await.unwrap(), settled);

    // The accrual amount entered the ledger once.
    assert_eq!(store.balance(user).await.unwrap(), amount);
}
