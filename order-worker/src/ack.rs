//! Acknowledgment Controller
//!
//! Maps a processing outcome onto a broker settlement:
//!
//! | Outcome | `drop` | `requeue-once` |
//! |---------|--------|----------------|
//! | success | ack | ack |
//! | terminal failure | nack, no requeue | nack, no requeue |
//! | transient failure, first delivery | nack, no requeue | nack, requeue |
//! | transient failure, redelivery | nack, no requeue | nack, no requeue |
//!
//! "Redelivery" is the broker's `redelivered` flag, not a count kept by this
//! process. A message the broker hands out again after a worker crash or a
//! dropped connection is already a redelivery, so under `requeue-once` its
//! first transient failure here drops it.
//!
//! No dead-letter routing happens here; a dead-letter exchange bound to the
//! queue on the broker side will pick up every nack without requeue.

use std::fmt;
use std::str::FromStr;

use crate::broker::RawMessage;
use crate::error::{ConnectionError, FailureClass, ProcessingError};
use crate::processor::ProcessedOrder;

/// What happens to a delivery whose processing failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Drop every failed delivery
    #[default]
    Drop,
    /// Give transient failures one more delivery before dropping them
    RequeueOnce,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(FailurePolicy::Drop),
            "requeue-once" | "requeue_once" => Ok(FailurePolicy::RequeueOnce),
            other => Err(format!("expected `drop` or `requeue-once`, got `{other}`")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Drop => write!(f, "drop"),
            FailurePolicy::RequeueOnce => write!(f, "requeue-once"),
        }
    }
}

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Nack { requeue: bool },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AckController {
    policy: FailurePolicy,
}

impl AckController {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn decide(
        &self,
        redelivered: bool,
        outcome: &Result<ProcessedOrder, ProcessingError>,
    ) -> Settlement {
        let Err(err) = outcome else {
            return Settlement::Ack;
        };
        let requeue = match (self.policy, err.class()) {
            (FailurePolicy::RequeueOnce, FailureClass::Transient) => !redelivered,
            _ => false,
        };
        Settlement::Nack { requeue }
    }

    /// Settle `message` according to `outcome`
    ///
    /// A settlement error means the channel is gone; the broker redelivers
    /// the message to whichever consumer connects next.
    pub async fn settle(
        &self,
        message: &RawMessage,
        outcome: &Result<ProcessedOrder, ProcessingError>,
    ) -> Result<Settlement, ConnectionError> {
        let settlement = self.decide(message.redelivered, outcome);

        match settlement {
            Settlement::Ack => message.ack().await?,
            Settlement::Nack { requeue } => message.nack(requeue).await?,
        }

        match (outcome, settlement) {
            (Ok(processed), _) => {
                tracing::info!(
                    order_id = %processed.order_id,
                    delivery_tag = message.delivery_tag,
                    "Message acknowledged"
                );
            }
            (Err(err), Settlement::Nack { requeue: true }) => {
                tracing::warn!(
                    order_id = err.order_id().unwrap_or("-"),
                    delivery_tag = message.delivery_tag,
                    class = %err.class(),
                    error = %err,
                    "❌ Message rejected, requeued for one more attempt"
                );
            }
            (Err(err), _) => {
                tracing::error!(
                    order_id = err.order_id().unwrap_or("-"),
                    delivery_tag = message.delivery_tag,
                    class = %err.class(),
                    policy = %self.policy,
                    error = %err,
                    "❌ Message rejected without requeue"
                );
            }
        }

        Ok(settlement)
    }
}
