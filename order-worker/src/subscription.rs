//! Subscription Controller
//!
//! Declares the order queue, bounds the channel to one unacknowledged
//! delivery and starts a manual-ack consumer. Runs again on every new
//! channel after a reconnect.

use crate::broker::{BrokerChannel, DeliveryStream};
use crate::error::ConnectionError;

/// Unacknowledged deliveries the worker holds at once
pub const PREFETCH_COUNT: u16 = 1;

#[derive(Debug, Clone)]
pub struct SubscriptionController {
    queue: String,
    consumer_tag: String,
}

impl SubscriptionController {
    pub fn new(queue: impl Into<String>) -> Self {
        Self::with_consumer_tag(queue, default_consumer_tag())
    }

    pub fn with_consumer_tag(queue: impl Into<String>, consumer_tag: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            consumer_tag: consumer_tag.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Declare → prefetch → consume, in that order
    pub async fn subscribe(
        &self,
        channel: &mut dyn BrokerChannel,
    ) -> Result<DeliveryStream, ConnectionError> {
        channel.declare_durable_queue(&self.queue).await?;
        channel.set_prefetch(PREFETCH_COUNT).await?;
        let deliveries = channel.consume(&self.queue, &self.consumer_tag).await?;

        tracing::info!(
            queue = %self.queue,
            consumer_tag = %self.consumer_tag,
            prefetch = PREFETCH_COUNT,
            "👂 Waiting for orders"
        );
        Ok(deliveries)
    }

    /// Stop receiving new deliveries; unsettled ones stay settleable
    pub async fn unsubscribe(&self, channel: &mut dyn BrokerChannel) -> Result<(), ConnectionError> {
        channel.cancel(&self.consumer_tag).await?;
        tracing::info!(consumer_tag = %self.consumer_tag, "Consumer cancelled");
        Ok(())
    }
}

/// `order-worker-<pid>`
pub fn default_consumer_tag() -> String {
    format!("order-worker-{}", std::process::id())
}
