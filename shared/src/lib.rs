//! Shared types for the ordering platform
//!
//! Wire types exchanged between the order API (producer) and the
//! fulfillment worker (consumer) over the order queue.

pub mod order;

// Re-exports
pub use order::{
    DecodeError, ORDER_QUEUE, OrderMessage, OrderMessageItem, OrderStatus, UnknownStatus,
};
pub use serde::{Deserialize, Serialize};
