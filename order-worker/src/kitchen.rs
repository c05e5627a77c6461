//! Kitchen capability
//!
//! The preparation step is a call-out to the kitchen. [`SimulatedKitchen`]
//! stands in for the real kitchen system by holding each order for a fixed
//! time; [`TimedKitchen`] bounds any kitchen with a per-order timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared::OrderMessage;
use thiserror::Error;

use crate::config::WorkerConfig;

#[derive(Debug, Error)]
pub enum KitchenError {
    #[error("kitchen rejected the order: {0}")]
    Rejected(String),

    #[error("preparation exceeded {0:?}")]
    TimedOut(Duration),
}

/// Prepares placed orders
#[async_trait]
pub trait Kitchen: Send + Sync {
    async fn prepare(&self, order: &OrderMessage) -> Result<(), KitchenError>;
}

/// Holds every order for a fixed duration, then reports success
#[derive(Debug, Clone)]
pub struct SimulatedKitchen {
    duration: Duration,
}

impl SimulatedKitchen {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Kitchen for SimulatedKitchen {
    async fn prepare(&self, order: &OrderMessage) -> Result<(), KitchenError> {
        tracing::debug!(
            order_id = %order.order_id,
            units = order.unit_count(),
            duration_ms = self.duration.as_millis() as u64,
            "Kitchen preparing order"
        );
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// Fails a preparation that runs longer than `timeout`
pub struct TimedKitchen<K> {
    inner: K,
    timeout: Duration,
}

impl<K: Kitchen> TimedKitchen<K> {
    pub fn new(inner: K, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<K: Kitchen> Kitchen for TimedKitchen<K> {
    async fn prepare(&self, order: &OrderMessage) -> Result<(), KitchenError> {
        tokio::time::timeout(self.timeout, self.inner.prepare(order))
            .await
            .map_err(|_| KitchenError::TimedOut(self.timeout))?
    }
}

/// Kitchen described by the worker configuration
pub fn from_config(config: &WorkerConfig) -> Arc<dyn Kitchen> {
    let kitchen = SimulatedKitchen::new(config.preparation_delay);
    match config.preparation_timeout {
        Some(timeout) => Arc::new(TimedKitchen::new(kitchen, timeout)),
        None => Arc::new(kitchen),
    }
}
