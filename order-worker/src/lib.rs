//! Order Worker - background fulfillment worker for placed orders
//!
//! # Overview
//!
//! Consumes order-placement messages from a durable AMQP queue, hands each
//! order to the kitchen, then marks it PREPARING in the order database.
//! Deliveries are acknowledged manually, one at a time.
//!
//! # Module layout
//!
//! ```text
//! order-worker/src/
//! ├── config.rs        # WorkerConfig from environment, broker URL redaction
//! ├── broker/          # Broker / BrokerChannel seam, lapin implementation
//! ├── connection.rs    # fixed-interval reconnect
//! ├── subscription.rs  # declare queue, prefetch=1, consume
//! ├── processor.rs     # decode → prepare → mark PREPARING
//! ├── ack.rs           # ack / nack per outcome and failure policy
//! ├── kitchen.rs       # preparation capability
//! ├── store.rs         # order status persistence (PostgreSQL)
//! ├── shutdown.rs      # signals and ordered release
//! ├── worker.rs        # lifecycle and receive loop
//! └── logger.rs        # tracing setup, daily log files
//! ```

pub mod ack;
pub mod broker;
pub mod config;
pub mod connection;
pub mod error;
pub mod kitchen;
pub mod logger;
pub mod processor;
pub mod shutdown;
pub mod store;
pub mod subscription;
pub mod worker;

pub use ack::{AckController, FailurePolicy, Settlement};
pub use broker::{Acker, AmqpBroker, Broker, BrokerChannel, DeliveryStream, RawMessage};
pub use config::{BrokerUrl, ConfigError, WorkerConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{ConnectionError, FailureClass, ProcessingError};
pub use kitchen::{Kitchen, KitchenError, SimulatedKitchen, TimedKitchen};
pub use logger::{cleanup_old_logs, init_logger_with_file};
pub use processor::{OrderProcessor, ProcessedOrder};
pub use shutdown::ShutdownCoordinator;
pub use store::{OrderStatusStore, PgOrderStatusStore, StatusUpdate, StoreError};
pub use subscription::{PREFETCH_COUNT, SubscriptionController};
pub use worker::{Worker, WorkerState, WorkerStats};
