//! Connection Manager
//!
//! ```text
//! DISCONNECTED ──► CONNECTING ──► CONNECTED
//!      ▲               │              │
//!      └───────────────┴──── error ───┘
//! ```
//!
//! Reconnects forever on a fixed interval. The interval is tunable
//! (`RECONNECT_DELAY_MS`) but deliberately not exponential: this is a
//! long-running worker with a single upstream.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, BrokerChannel};
use crate::config::BrokerUrl;
use crate::error::ConnectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

pub struct ConnectionManager {
    broker: Arc<dyn Broker>,
    url: BrokerUrl,
    retry_delay: Duration,
    state: ConnectionState,
    attempts: u64,
}

impl ConnectionManager {
    pub fn new(broker: Arc<dyn Broker>, url: BrokerUrl, retry_delay: Duration) -> Self {
        Self {
            broker,
            url,
            retry_delay,
            state: ConnectionState::Disconnected,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connection attempts made so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// One connection attempt
    pub async fn connect(&mut self) -> Result<Box<dyn BrokerChannel>, ConnectionError> {
        self.attempts += 1;
        self.transition(ConnectionState::Connecting);
        tracing::info!(
            broker = %self.url,
            attempt = self.attempts,
            "🔌 Connecting to broker"
        );

        match self.broker.connect(&self.url).await {
            Ok(channel) => {
                self.transition(ConnectionState::Connected);
                tracing::info!(broker = %self.url, attempt = self.attempts, "Connected to broker");
                Ok(channel)
            }
            Err(e) => {
                tracing::warn!(
                    broker = %self.url,
                    attempt = self.attempts,
                    error = %e,
                    "Connection attempt failed"
                );
                self.transition(ConnectionState::Disconnected);
                if e.is_refused() {
                    tracing::error!(
                        "💡 Check that the broker is running and reachable, \
                         and that RABBITMQ_URL uses the broker's service name rather than an IP"
                    );
                }
                Err(e)
            }
        }
    }

    /// Connect, retrying on the fixed interval until it works
    ///
    /// Returns `None` only when `shutdown` fires first.
    pub async fn connect_with_retry(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Option<Box<dyn BrokerChannel>> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }

            let attempt = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                result = self.connect() => result,
            };

            match attempt {
                Ok(channel) => return Some(channel),
                Err(_) => {
                    if !self.wait_before_retry(shutdown).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleep for the retry interval; `false` if shutdown interrupted the wait
    pub async fn wait_before_retry(&self, shutdown: &CancellationToken) -> bool {
        tracing::info!(
            delay_ms = self.retry_delay.as_millis() as u64,
            "🔄 Retrying broker connection"
        );
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.retry_delay) => true,
        }
    }

    /// Record that an established connection dropped
    pub fn mark_disconnected(&mut self, reason: &ConnectionError) {
        tracing::warn!(broker = %self.url, error = %reason, "Broker connection lost");
        self.transition(ConnectionState::Disconnected);
    }

    /// Record a deliberate close
    pub fn mark_closed(&mut self) {
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Connection state changed");
            self.state = next;
        }
    }
}
