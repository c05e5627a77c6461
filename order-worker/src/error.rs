//! Worker error taxonomy
//!
//! - [`ConnectionError`]: broker unreachable or channel lost. Retried
//!   forever by the connection manager, never seen by the message layer.
//! - [`ProcessingError`]: a single delivery could not be handled. Contained
//!   to that delivery and settled by the acknowledgment controller.

use std::fmt;

use shared::DecodeError;
use thiserror::Error;

use crate::kitchen::KitchenError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection attempt failed; `target` and `reason` are already redacted
    #[error("cannot reach broker at {target}: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("broker channel error: {0}")]
    Channel(String),

    #[error("delivery stream closed by broker")]
    StreamClosed,
}

impl ConnectionError {
    pub fn channel(err: impl fmt::Display) -> Self {
        ConnectionError::Channel(err.to_string())
    }

    /// The broker actively refused the TCP connection
    pub fn is_refused(&self) -> bool {
        match self {
            ConnectionError::Unreachable { reason, .. } => {
                reason.to_ascii_lowercase().contains("refused")
            }
            _ => false,
        }
    }
}

/// Whether retrying the same delivery could ever succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Poison input: fails identically on every attempt
    Terminal,
    /// Caused by a collaborator that may recover
    Transient,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Terminal => write!(f, "terminal"),
            FailureClass::Transient => write!(f, "transient"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("preparation of order {order_id} failed: {source}")]
    Preparation {
        order_id: String,
        #[source]
        source: KitchenError,
    },

    #[error("status update of order {order_id} failed: {source}")]
    Persistence {
        order_id: String,
        #[source]
        source: StoreError,
    },
}

impl ProcessingError {
    pub fn class(&self) -> FailureClass {
        match self {
            ProcessingError::Decode(_) => FailureClass::Terminal,
            ProcessingError::Preparation { .. } | ProcessingError::Persistence { .. } => {
                FailureClass::Transient
            }
        }
    }

    /// Order the failure belongs to, when the payload got far enough to tell
    pub fn order_id(&self) -> Option<&str> {
        match self {
            ProcessingError::Decode(_) => None,
            ProcessingError::Preparation { order_id, .. }
            | ProcessingError::Persistence { order_id, .. } => Some(order_id),
        }
    }
}
