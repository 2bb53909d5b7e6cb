//! loyalty-db
//!
//! Postgres implementation of the [`Store`] port.
//!
//! Queries are runtime-bound (`sqlx::query` + `bind`/`try_get`), schema is
//! managed with embedded SQLx migrations. Two invariants are enforced at
//! the SQL layer rather than trusted to callers:
//!
//! - **Terminal rows are immutable**: `update_order` carries a status
//!   predicate so a stale interim verdict racing a terminal one degrades
//!   to a no-op instead of rewriting history.
//! - **Withdrawals are an atomic check-and-insert**: `create_withdrawal`
//!   serializes per user via an advisory transaction lock and recomputes
//!   the balance inside the same transaction, so two concurrent
//!   withdrawals can never overdraw the account.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use loyalty_core::{NewOrder, Order, OrderStatus, Points, Store, StoreError, User, Withdrawal};

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

const BALANCE_SQL: &str = r#"
    select coalesce((select sum(accrual_micros)
                     from orders
                     where user_id = $1 and status = 'PROCESSED'), 0)::bigint
         - coalesce((select sum(sum_micros)
                     from withdrawals
                     where user_id = $1), 0)::bigint
"#;

// ---------------------------------------------------------------------------
// Pool bootstrap
// ---------------------------------------------------------------------------

/// Connect to Postgres at `database_url`.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// [`Store`] adapter over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and migrate in one step.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = connect(database_url).await?;
        migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status_raw: String = row.try_get("status").map_err(backend)?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Backend(format!("unknown order status in db: {status_raw}")))?;
    Ok(Order {
        number: row.try_get("number").map_err(backend)?,
        user_id: row.try_get("user_id").map_err(backend)?,
        status,
        accrual: Points::new(row.try_get("accrual_micros").map_err(backend)?),
        uploaded_at: row.try_get("uploaded_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            insert into users (id, login, password_hash, password_salt)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(login)
        .bind(password_hash)
        .bind(password_salt)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::LoginTaken
            } else {
                backend(e)
            }
        })?;
        Ok(id)
    }

    async fn user_by_login(&self, login: &str) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            select id, login, password_hash, password_salt
            from users
            where login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::UserNotFound)?;

        Ok(User {
            id: row.try_get("id").map_err(backend)?,
            login: row.try_get("login").map_err(backend)?,
            password_hash: row.try_get("password_hash").map_err(backend)?,
            password_salt: row.try_get("password_salt").map_err(backend)?,
        })
    }

    async fn create_order(&self, order: &NewOrder) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into orders (number, user_id, status, uploaded_at)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(&order.number)
        .bind(order.user_id)
        .bind(OrderStatus::New.as_str())
        .bind(order.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateOrder
            } else {
                backend(e)
            }
        })?;
        Ok(())
    }

    async fn order_by_number(&self, number: &str) -> Result<Order, StoreError> {
        let row = sqlx::query(
            r#"
            select number, user_id, status, accrual_micros, uploaded_at, updated_at
            from orders
            where number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::OrderNotFound)?;

        order_from_row(&row)
    }

    async fn orders_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"
            select number, user_id, status, accrual_micros, uploaded_at, updated_at
            from orders
            where user_id = $1
            order by uploaded_at asc
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(order_from_row).collect()
    }

    async fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), StoreError> {
        // Terminal rows never match the predicate; a stale write is a no-op.
        sqlx::query(
            r#"
            update orders
            set status = $2, accrual_micros = $3, updated_at = $4
            where number = $1
              and status not in ('PROCESSED', 'INVALID')
            "#,
        )
        .bind(number)
        .bind(status.as_str())
        .bind(accrual.raw())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn orders_with_status(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<String>, StoreError> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(
            r#"
            select number
            from orders
            where status = any($1)
            order by uploaded_at asc
            "#,
        )
        .bind(&names)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| row.try_get("number").map_err(backend))
            .collect()
    }

    async fn balance(&self, user_id: Uuid) -> Result<Points, StoreError> {
        let (raw,): (i64,) = sqlx::query_as::<_, (i64,)>(BALANCE_SQL)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(Points::new(raw))
    }

    async fn withdrawn_total(&self, user_id: Uuid) -> Result<Points, StoreError> {
        let (raw,): (i64,) = sqlx::query_as::<_, (i64,)>(
            r#"
            select coalesce(sum(sum_micros), 0)::bigint
            from withdrawals
            where user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(Points::new(raw))
    }

    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        order_number: &str,
        sum: Points,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Per-user serialization point: concurrent withdrawals for the same
        // user queue behind this lock until the transaction ends.
        sqlx::query("select pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let (balance,): (i64,) = sqlx::query_as::<_, (i64,)>(BALANCE_SQL)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
        if balance < sum.raw() {
            return Err(StoreError::InsufficientFunds);
        }

        sqlx::query(
            r#"
            insert into withdrawals (order_number, user_id, sum_micros, processed_at)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(order_number)
        .bind(user_id)
        .bind(sum.raw())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::WithdrawalExists
            } else {
                backend(e)
            }
        })?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn withdrawals_by_user(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, StoreError> {
        let rows = sqlx::query(
            r#"
            select order_number, user_id, sum_micros, processed_at
            from withdrawals
            where user_id = $1
            order by processed_at asc
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                Ok(Withdrawal {
                    order_number: row.try_get("order_number").map_err(backend)?,
                    user_id: row.try_get("user_id").map_err(backend)?,
                    sum: Points::new(row.try_get("sum_micros").map_err(backend)?),
                    processed_at: row.try_get("processed_at").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
