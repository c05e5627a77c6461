//! Order status persistence
//!
//! The worker's only write into the order database. The store is the
//! idempotency boundary: a status is only applied when the order currently
//! sits in one of its legal predecessors, so a redelivered order leaves an
//! already-advanced order untouched.

use async_trait::async_trait;
use shared::{OrderStatus, UnknownStatus};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Outcome of a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The order moved into the requested status
    Applied,
    /// The order was already past the transition; nothing changed
    Unchanged { current: OrderStatus },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored status is not recognised: {0}")]
    CorruptStatus(#[from] UnknownStatus),
}

/// Sets order status, keyed by order id
#[async_trait]
pub trait OrderStatusStore: Send + Sync {
    async fn set_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<StatusUpdate, StoreError>;

    /// Release connections held by the store
    async fn close(&self) {}
}

const UPDATE_STATUS_SQL: &str = r#"
    UPDATE "Order"
    SET status = $2::"OrderStatus"
    WHERE id = $1 AND status::text = ANY($3)
"#;

const SELECT_STATUS_SQL: &str = r#"SELECT status::text FROM "Order" WHERE id = $1"#;

/// PostgreSQL order store (the API's `"Order"` table)
#[derive(Debug, Clone)]
pub struct PgOrderStatusStore {
    pool: PgPool,
}

impl PgOrderStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool that connects on first use
    ///
    /// Only an unparseable URL fails here; an unreachable database shows up
    /// later as a per-order persistence error.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl OrderStatusStore for PgOrderStatusStore {
    async fn set_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<StatusUpdate, StoreError> {
        let predecessors: Vec<String> = status
            .predecessors()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let result = sqlx::query(UPDATE_STATUS_SQL)
            .bind(order_id)
            .bind(status.as_str())
            .bind(&predecessors)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(StatusUpdate::Applied);
        }

        let current: Option<String> = sqlx::query_scalar(SELECT_STATUS_SQL)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        match current {
            Some(current) => Ok(StatusUpdate::Unchanged {
                current: current.parse()?,
            }),
            None => Err(StoreError::OrderNotFound(order_id.to_string())),
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
