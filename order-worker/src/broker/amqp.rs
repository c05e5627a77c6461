//! AMQP 0-9-1 broker (RabbitMQ) backed by lapin

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};

use super::{Acker, Broker, BrokerChannel, DeliveryStream, RawMessage};
use crate::config::BrokerUrl;
use crate::error::ConnectionError;

/// AMQP reply code for a normal close
const REPLY_SUCCESS: u16 = 200;

/// Connects to RabbitMQ with lapin
#[derive(Debug, Clone)]
pub struct AmqpBroker {
    connection_name: String,
}

impl AmqpBroker {
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
        }
    }
}

impl Default for AmqpBroker {
    fn default() -> Self {
        Self::new("order-worker")
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn connect(&self, url: &BrokerUrl) -> Result<Box<dyn BrokerChannel>, ConnectionError> {
        // lapin errors may echo the target; never let the password through
        let unreachable = |err: lapin::Error| ConnectionError::Unreachable {
            target: url.redacted().to_string(),
            reason: url.scrub(&err.to_string()),
        };

        let properties = ConnectionProperties::default()
            .with_connection_name(self.connection_name.clone().into());
        let connection = Connection::connect(url.as_str(), properties)
            .await
            .map_err(unreachable)?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close(REPLY_SUCCESS, "channel setup failed").await;
                return Err(unreachable(e));
            }
        };

        Ok(Box::new(AmqpChannel {
            connection,
            channel,
        }))
    }
}

struct AmqpChannel {
    connection: Connection,
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_durable_queue(&mut self, queue: &str) -> Result<(), ConnectionError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map(|_| ())
            .map_err(ConnectionError::channel)
    }

    async fn set_prefetch(&mut self, count: u16) -> Result<(), ConnectionError> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(ConnectionError::channel)
    }

    async fn consume(
        &mut self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectionError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(ConnectionError::channel)?;

        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(|d| {
                        RawMessage::new(d.delivery_tag, d.redelivered, d.data, AmqpAcker(d.acker))
                    })
                    .map_err(ConnectionError::channel)
            })
            .boxed())
    }

    async fn cancel(&mut self, consumer_tag: &str) -> Result<(), ConnectionError> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(ConnectionError::channel)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        let channel_closed = if self.channel.status().connected() {
            self.channel
                .close(REPLY_SUCCESS, "worker shutdown")
                .await
                .map_err(ConnectionError::channel)
        } else {
            Ok(())
        };

        let connection_closed = if self.connection.status().connected() {
            self.connection
                .close(REPLY_SUCCESS, "worker shutdown")
                .await
                .map_err(ConnectionError::channel)
        } else {
            Ok(())
        };

        channel_closed.and(connection_closed)
    }
}

struct AmqpAcker(lapin::acker::Acker);

#[async_trait]
impl Acker for AmqpAcker {
    async fn ack(&self) -> Result<(), ConnectionError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(ConnectionError::channel)
    }

    async fn nack(&self, requeue: bool) -> Result<(), ConnectionError> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                multiple: false,
            })
            .await
            .map_err(ConnectionError::channel)
    }
}
