//! Order status lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status as persisted by the API
///
/// ```text
/// PENDING ──► PREPARING ──► COMPLETED
///    │            │
///    └────────────┴───────► CANCELLED
/// ```
///
/// The fulfillment worker only ever writes `PREPARING`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, waiting for the kitchen
    #[default]
    Pending,
    /// Accepted by the kitchen
    Preparing,
    /// Delivered to the customer
    Completed,
    /// Cancelled by the customer or the back office
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Statuses from which a transition into `self` is legal.
    ///
    /// An order sitting in any other status is left untouched when `self`
    /// is applied, which makes the transition idempotent under redelivery.
    pub fn predecessors(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[],
            OrderStatus::Preparing => &[OrderStatus::Pending],
            OrderStatus::Completed => &[OrderStatus::Preparing],
            OrderStatus::Cancelled => &[OrderStatus::Pending, OrderStatus::Preparing],
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised status text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
