use std::sync::Arc;

use loyalty_core::{OrderStatus, Points};
use loyalty_engine::{OrderError, OrderQueue, OrderService, WithdrawalPolicy};
use loyalty_testkit::{MemoryStore, ScriptedAccrual};

fn setup(policy: WithdrawalPolicy) -> (Arc<MemoryStore>, OrderService) {
    let store = Arc::new(MemoryStore::new());
    let accrual = Arc::new(ScriptedAccrual::new());
    let (queue, _rx) = OrderQueue::standalone(100);
    let service = OrderService::new(store.clone(), accrual, queue, policy);
    (store, service)
}

const PTS: i64 = 1_000_000;

#[tokio::test]
async fn scenario_withdrawing_the_exact_balance_drives_it_to_zero() {
    let (store, service) = setup(WithdrawalPolicy::default());
    let user = store.seed_user("alice");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(500 * PTS));

    service
        .withdraw(user, "2377225624", Points::new(500 * PTS))
        .await
        .unwrap();

    let (balance, withdrawn) = service.balance(user).await.unwrap();
    assert_eq!(balance, Points::ZERO);
    assert_eq!(withdrawn, Points::new(500 * PTS));

    // One kopeck over the (now zero) balance fails and changes nothing.
    assert_eq!(
        service.withdraw(user, "96", Points::new(10_000)).await,
        Err(OrderError::InsufficientFunds)
    );
    let (balance, withdrawn) = service.balance(user).await.unwrap();
    assert_eq!(balance, Points::ZERO);
    assert_eq!(withdrawn, Points::new(500 * PTS));
}

#[tokio::test]
async fn scenario_overdraw_by_a_fraction_is_refused() {
    let (store, service) = setup(WithdrawalPolicy::default());
    let user = store.seed_user("alice");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(100 * PTS));

    assert_eq!(
        service
            .withdraw(user, "2377225624", Points::new(100 * PTS + 10_000))
            .await,
        Err(OrderError::InsufficientFunds)
    );
    let (balance, _) = service.balance(user).await.unwrap();
    assert_eq!(balance, Points::new(100 * PTS));
}

#[tokio::test]
async fn scenario_second_withdrawal_against_the_same_order_is_refused() {
    let (store, service) = setup(WithdrawalPolicy::default());
    let user = store.seed_user("alice");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(100 * PTS));

    service
        .withdraw(user, "2377225624", Points::new(10 * PTS))
        .await
        .unwrap();
    assert_eq!(
        service
            .withdraw(user, "2377225624", Points::new(10 * PTS))
            .await,
        Err(OrderError::WithdrawAlreadyExists)
    );
}

#[tokio::test]
async fn scenario_withdrawal_target_validation_is_a_policy_choice() {
    // Reference behavior: only non-empty is enforced.
    let (store, service) = setup(WithdrawalPolicy::default());
    let user = store.seed_user("alice");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(100 * PTS));

    assert_eq!(
        service.withdraw(user, "", Points::new(PTS)).await,
        Err(OrderError::InvalidOrderNumber)
    );
    // "123" fails Luhn but passes under the default policy.
    service.withdraw(user, "123", Points::new(PTS)).await.unwrap();

    // Strict policy: Luhn is required.
    let (store, service) = setup(WithdrawalPolicy { require_luhn: true });
    let user = store.seed_user("bob");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(100 * PTS));

    assert_eq!(
        service.withdraw(user, "123", Points::new(PTS)).await,
        Err(OrderError::InvalidOrderNumber)
    );
    service
        .withdraw(user, "2377225624", Points::new(PTS))
        .await
        .unwrap();
}

#[tokio::test]
async fn scenario_non_positive_sums_are_rejected() {
    let (store, service) = setup(WithdrawalPolicy::default());
    let user = store.seed_user("alice");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(100 * PTS));

    assert_eq!(
        service.withdraw(user, "2377225624", Points::ZERO).await,
        Err(OrderError::InvalidWithdrawalSum)
    );
    assert_eq!(
        service.withdraw(user, "2377225624", Points::new(-PTS)).await,
        Err(OrderError::InvalidWithdrawalSum)
    );
}

#[tokio::test]
async fn scenario_balance_is_the_ledger_sum_regardless_of_operation_order() {
    // Accruals first, then withdrawals.
    let (store, service) = setup(WithdrawalPolicy::default());
    let user = store.seed_user("alice");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(300 * PTS));
    store.seed_order("2", user, OrderStatus::Processed, Points::new(200 * PTS));
    service.withdraw(user, "91", Points::new(150 * PTS)).await.unwrap();
    service.withdraw(user, "92", Points::new(50 * PTS)).await.unwrap();
    assert_eq!(
        service.balance(user).await.unwrap(),
        (Points::new(300 * PTS), Points::new(200 * PTS))
    );

    // Interleaved: same ledger, same aggregates.
    let (store, service) = setup(WithdrawalPolicy::default());
    let user = store.seed_user("alice");
    store.seed_order("1", user, OrderStatus::Processed, Points::new(300 * PTS));
    service.withdraw(user, "91", Points::new(150 * PTS)).await.unwrap();
    store.seed_order("2", user, OrderStatus::Processed, Points::new(200 * PTS));
    service.withdraw(user, "92", Points::new(50 * PTS)).await.unwrap();
    assert_eq!(
        service.balance(user).await.unwrap(),
        (Points::new(300 * PTS), Points::new(200 * PTS))
    );

    // Withdrawals are listed ascending by processed time.
    let listed = service.withdrawals(user).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].order_number, "91");
    assert_eq!(listed[1].order_number, "92");
}
