//! Broker abstraction
//!
//! ```text
//!        ┌────────────────────────┐
//!        │ Broker / BrokerChannel │  ◄── pluggable seam
//!        └───────────┬────────────┘
//!                    │
//!           ┌────────┴────────┐
//!           ▼                 ▼
//!      AmqpBroker        test doubles
//!      (lapin)           (in-process)
//! ```
//!
//! A channel hands out deliveries as a stream of [`RawMessage`]; each
//! message carries its own [`Acker`] so it can be settled independently of
//! the stream it came from.

mod amqp;

pub use amqp::AmqpBroker;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::BrokerUrl;
use crate::error::ConnectionError;

/// Deliveries of one consumer, in broker order
pub type DeliveryStream = BoxStream<'static, Result<RawMessage, ConnectionError>>;

/// Opens connections to a message broker
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a connection and a channel on it
    async fn connect(&self, url: &BrokerUrl) -> Result<Box<dyn BrokerChannel>, ConnectionError>;
}

/// A live channel together with the connection that owns it
#[async_trait]
pub trait BrokerChannel: Send {
    /// Declare `queue` as durable (idempotent)
    async fn declare_durable_queue(&mut self, queue: &str) -> Result<(), ConnectionError>;

    /// Limit unacknowledged deliveries held by this channel
    async fn set_prefetch(&mut self, count: u16) -> Result<(), ConnectionError>;

    /// Start a manual-ack consumer
    async fn consume(
        &mut self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectionError>;

    /// Stop the consumer registered under `consumer_tag`
    async fn cancel(&mut self, consumer_tag: &str) -> Result<(), ConnectionError>;

    /// Close the channel, then the connection
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Settles one delivery
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> Result<(), ConnectionError>;

    async fn nack(&self, requeue: bool) -> Result<(), ConnectionError>;
}

/// A delivery as received from the broker, before decoding
pub struct RawMessage {
    pub delivery_tag: u64,
    /// Set by the broker when this message was delivered before
    pub redelivered: bool,
    pub payload: Vec<u8>,
    acker: Box<dyn Acker>,
}

impl RawMessage {
    pub fn new(
        delivery_tag: u64,
        redelivered: bool,
        payload: Vec<u8>,
        acker: impl Acker + 'static,
    ) -> Self {
        Self {
            delivery_tag,
            redelivered,
            payload,
            acker: Box::new(acker),
        }
    }

    pub async fn ack(&self) -> Result<(), ConnectionError> {
        self.acker.ack().await
    }

    pub async fn nack(&self, requeue: bool) -> Result<(), ConnectionError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMessage")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
