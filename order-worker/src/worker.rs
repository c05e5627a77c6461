//! Order worker
//!
//! ```text
//! STARTING → CONNECTING ⇄ CONSUMING ⇄ PROCESSING
//!                 │            │
//!                 └────────────┴──► DRAINING → STOPPED
//! ```
//!
//! One delivery is processed and settled at a time. Shutdown is only
//! observed between deliveries, so a message that has started processing
//! always reaches its ack or nack before the channel is closed.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::ack::{AckController, Settlement};
use crate::broker::{Broker, DeliveryStream, RawMessage};
use crate::config::WorkerConfig;
use crate::connection::ConnectionManager;
use crate::error::ConnectionError;
use crate::kitchen::Kitchen;
use crate::processor::OrderProcessor;
use crate::shutdown;
use crate::store::OrderStatusStore;
use crate::subscription::SubscriptionController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Connecting,
    Consuming,
    Processing,
    Draining,
    Stopped,
}

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub acked: u64,
    /// Nacked without requeue
    pub dropped: u64,
    pub requeued: u64,
    pub connection_attempts: u64,
}

/// Why the receive loop ended
enum LoopExit {
    Shutdown,
    ConnectionLost(ConnectionError),
}

pub struct Worker {
    connection: ConnectionManager,
    subscription: SubscriptionController,
    processor: OrderProcessor,
    acks: AckController,
    shutdown: CancellationToken,
    state: watch::Sender<WorkerState>,
    stats: WorkerStats,
}

impl Worker {
    pub fn from_config(
        config: &WorkerConfig,
        broker: Arc<dyn Broker>,
        kitchen: Arc<dyn Kitchen>,
        store: Arc<dyn OrderStatusStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Starting);
        Self {
            connection: ConnectionManager::new(
                broker,
                config.broker_url.clone(),
                config.reconnect_delay,
            ),
            subscription: SubscriptionController::new(config.queue.clone()),
            processor: OrderProcessor::new(kitchen, store),
            acks: AckController::new(config.failure_policy),
            shutdown,
            state,
            stats: WorkerStats::default(),
        }
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Consume until shutdown, then drain and release everything
    pub async fn run(mut self) -> WorkerStats {
        tracing::info!(
            queue = %self.subscription.queue(),
            consumer_tag = %self.subscription.consumer_tag(),
            failure_policy = %self.acks.policy(),
            "🚀 Order worker starting"
        );

        let channel = loop {
            self.set_state(WorkerState::Connecting);
            let Some(mut channel) = self.connection.connect_with_retry(&self.shutdown).await else {
                break None;
            };

            let exit = match self.subscription.subscribe(channel.as_mut()).await {
                Ok(mut deliveries) => {
                    self.set_state(WorkerState::Consuming);
                    self.receive(&mut deliveries).await
                }
                Err(e) => LoopExit::ConnectionLost(e),
            };

            match exit {
                LoopExit::Shutdown => break Some(channel),
                LoopExit::ConnectionLost(e) => {
                    if let Err(close_err) = channel.close().await {
                        tracing::debug!(error = %close_err, "Closing lost connection failed");
                    }
                    self.connection.mark_disconnected(&e);
                    if !self.connection.wait_before_retry(&self.shutdown).await {
                        break None;
                    }
                }
            }
        };

        self.set_state(WorkerState::Draining);
        tracing::info!("Draining: no in-flight order, releasing resources");
        shutdown::release(channel, &self.subscription, self.processor.store()).await;
        self.connection.mark_closed();

        self.stats.connection_attempts = self.connection.attempts();
        self.set_state(WorkerState::Stopped);
        tracing::info!(
            received = self.stats.received,
            acked = self.stats.acked,
            dropped = self.stats.dropped,
            requeued = self.stats.requeued,
            connection_attempts = self.stats.connection_attempts,
            "👋 Order worker stopped"
        );
        self.stats
    }

    async fn receive(&mut self, deliveries: &mut DeliveryStream) -> LoopExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return LoopExit::Shutdown,
                next = deliveries.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => return LoopExit::ConnectionLost(e),
                None => return LoopExit::ConnectionLost(ConnectionError::StreamClosed),
            };

            if let Err(e) = self.handle(message).await {
                return LoopExit::ConnectionLost(e);
            }
        }
    }

    /// Process and settle one delivery
    async fn handle(&mut self, message: RawMessage) -> Result<(), ConnectionError> {
        self.stats.received += 1;
        self.set_state(WorkerState::Processing);

        let outcome = self.processor.process(&message).await;
        let settlement = self.acks.settle(&message, &outcome).await?;

        match settlement {
            Settlement::Ack => self.stats.acked += 1,
            Settlement::Nack { requeue: true } => self.stats.requeued += 1,
            Settlement::Nack { requeue: false } => self.stats.dropped += 1,
        }

        self.set_state(WorkerState::Consuming);
        Ok(())
    }

    fn set_state(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "Worker state changed");
        }
    }
}
