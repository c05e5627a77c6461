//! Shutdown Coordinator
//!
//! SIGTERM (container stop) and SIGINT (Ctrl+C) both cancel one
//! [`CancellationToken`]. The worker stops taking deliveries, lets the
//! in-flight one settle, then [`release`]s its resources in order:
//! consumer → channel → connection → order store.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::BrokerChannel;
use crate::store::OrderStatusStore;
use crate::subscription::SubscriptionController;

#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown (idempotent)
    pub fn trigger(&self, reason: &str) {
        if !self.token.is_cancelled() {
            tracing::info!(reason, "🛑 Shutdown requested");
            self.token.cancel();
        }
    }

    /// Cancel the token on the first SIGTERM or SIGINT
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                signal = wait_for_signal() => coordinator.trigger(signal),
                _ = coordinator.token.cancelled() => {}
            }
        })
    }
}

/// Resolves with the name of the first termination signal received
async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Release broker and store resources
///
/// Each step is attempted even if an earlier one failed; a channel that is
/// already gone has nothing left to cancel or close.
pub async fn release(
    channel: Option<Box<dyn BrokerChannel>>,
    subscription: &SubscriptionController,
    store: &Arc<dyn OrderStatusStore>,
) {
    if let Some(mut channel) = channel {
        if let Err(e) = subscription.unsubscribe(channel.as_mut()).await {
            tracing::warn!(error = %e, "Failed to cancel consumer");
        }
        match channel.close().await {
            Ok(()) => tracing::info!("Broker channel and connection closed"),
            Err(e) => tracing::warn!(error = %e, "Failed to close broker connection"),
        }
    }

    store.close().await;
    tracing::info!("Order store closed");
}
