//! In-memory `Store` implementation.
//!
//! A single mutex guards all state, which makes `create_withdrawal` an
//! atomic check-and-insert for free, the in-memory equivalent of the
//! per-user advisory lock the Postgres adapter takes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use loyalty_core::{
    NewOrder, Order, OrderStatus, Points, Store, StoreError, User, Withdrawal,
};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    orders: HashMap<String, Order>,
    withdrawals: Vec<Withdrawal>,
}

impl Inner {
    fn balance_of(&self, user_id: Uuid) -> Points {
        let accrued = self
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.status == OrderStatus::Processed)
            .fold(Points::ZERO, |acc, o| acc + o.accrual);
        accrued - self.withdrawn_of(user_id)
    }

    fn withdrawn_of(&self, user_id: Uuid) -> Points {
        self.withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .fold(Points::ZERO, |acc, w| acc + w.sum)
    }
}

/// Deterministic in-memory [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test convenience: register a user without going through auth.
    pub fn seed_user(&self, login: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().users.push(User {
            id,
            login: login.to_string(),
            password_hash: String::new(),
            password_salt: String::new(),
        });
        id
    }

    /// Test convenience: plant an order in an arbitrary status.
    pub fn seed_order(&self, number: &str, user_id: Uuid, status: OrderStatus, accrual: Points) {
        self.inner.lock().unwrap().orders.insert(
            number.to_string(),
            Order {
                number: number.to_string(),
                user_id,
                status,
                accrual,
                uploaded_at: Utc::now(),
                updated_at: None,
            },
        );
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.login == login) {
            return Err(StoreError::LoginTaken);
        }
        let id = Uuid::new_v4();
        inner.users.push(User {
            id,
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            password_salt: password_salt.to_string(),
        });
        Ok(id)
    }

    async fn user_by_login(&self, login: &str) -> Result<User, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.login == login)
            .cloned()
            .ok_or(StoreError::UserNotFound)
    }

    async fn create_order(&self, order: &NewOrder) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.orders.contains_key(&order.number) {
            return Err(StoreError::DuplicateOrder);
        }
        inner.orders.insert(
            order.number.clone(),
            Order {
                number: order.number.clone(),
                user_id: order.user_id,
                status: OrderStatus::New,
                accrual: Points::ZERO,
                uploaded_at: order.uploaded_at,
                updated_at: None,
            },
        );
        Ok(())
    }

    async fn order_by_number(&self, number: &str) -> Result<Order, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .orders
            .get(number)
            .cloned()
            .ok_or(StoreError::OrderNotFound)
    }

    async fn orders_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .inner
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.uploaded_at);
        Ok(orders)
    }

    async fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get_mut(number) {
            // Terminal rows are immutable; a stale write is a no-op.
            if !order.status.is_terminal() {
                order.status = status;
                order.accrual = accrual;
                order.updated_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn orders_with_status(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<&Order> = inner
            .orders
            .values()
            .filter(|o| statuses.contains(&o.status))
            .collect();
        matching.sort_by_key(|o| o.uploaded_at);
        Ok(matching.iter().map(|o| o.number.clone()).collect())
    }

    async fn balance(&self, user_id: Uuid) -> Result<Points, StoreError> {
        Ok(self.inner.lock().unwrap().balance_of(user_id))
    }

    async fn withdrawn_total(&self, user_id: Uuid) -> Result<Points, StoreError> {
        Ok(self.inner.lock().unwrap().withdrawn_of(user_id))
    }

    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        order_number: &str,
        sum: Points,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.withdrawals.iter().any(|w| w.order_number == order_number) {
            return Err(StoreError::WithdrawalExists);
        }
        if inner.balance_of(user_id) < sum {
            return Err(StoreError::InsufficientFunds);
        }
        inner.withdrawals.push(Withdrawal {
            order_number: order_number.to_string(),
            user_id,
            sum,
            processed_at: Utc::now(),
        });
        Ok(())
    }

    async fn withdrawals_by_user(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, StoreError> {
        let mut withdrawals: Vec<Withdrawal> = self
            .inner
            .lock()
            .unwrap()
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        withdrawals.sort_by_key(|w| w.processed_at);
        Ok(withdrawals)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn balance_is_processed_accruals_minus_withdrawals() {
        let store = MemoryStore::new();
        let user = store.seed_user("alice");

        store.seed_order("1", user, OrderStatus::Processed, Points::new(300_000_000));
        store.seed_order("2", user, OrderStatus::Processed, Points::new(200_000_000));
        // Non-terminal accruals never count.
        store.seed_order("3", user, OrderStatus::Processing, Points::new(999_000_000));

        store
            .create_withdrawal(user, "9", Points::new(150_000_000))
            .await
            .unwrap();

        assert_eq!(store.balance(user).await.unwrap(), Points::new(350_000_000));
        assert_eq!(
            store.withdrawn_total(user).await.unwrap(),
            Points::new(150_000_000)
        );
    }

    #[tokio::test]
    async fn terminal_orders_are_immutable() {
        let store = MemoryStore::new();
        let user = store.seed_user("bob");
        store.seed_order("1", user, OrderStatus::Processed, Points::new(500_000_000));

        store
            .update_order("1", OrderStatus::Processing, Points::ZERO)
            .await
            .unwrap();

        let order = store.order_by_number("1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.accrual, Points::new(500_000_000));
    }

    #[tokio::test]
    async fn withdrawal_is_atomic_check_and_insert() {
        let store = MemoryStore::new();
        let user = store.seed_user("carol");
        store.seed_order("1", user, OrderStatus::Processed, Points::new(100_000_000));

        assert_eq!(
            store
                .create_withdrawal(user, "5", Points::new(100_000_001))
                .await,
            Err(StoreError::InsufficientFunds)
        );
        store
            .create_withdrawal(user, "5", Points::new(100_000_000))
            .await
            .unwrap();
        assert_eq!(
            store
                .create_withdrawal(user, "5", Points::new(1))
                .await,
            Err(StoreError::WithdrawalExists)
        );
    }
}
