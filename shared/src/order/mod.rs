//! Order queue contract
//!
//! - [`OrderMessage`]: the event published when an order is placed
//! - [`OrderStatus`]: lifecycle of an order as stored by the API

pub mod message;
pub mod status;

// Re-exports
pub use message::{DecodeError, OrderMessage, OrderMessageItem};
pub use status::{OrderStatus, UnknownStatus};

/// Default name of the durable queue carrying placed orders
pub const ORDER_QUEUE: &str = "order_queue";
