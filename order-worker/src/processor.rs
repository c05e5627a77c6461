//! Order Processor
//!
//! Decode → prepare → mark PREPARING. Each stage logs its start and its
//! outcome; a failure stops the pipeline and is returned to the caller for
//! settlement.

use std::sync::Arc;

use shared::{OrderMessage, OrderStatus};

use crate::broker::RawMessage;
use crate::error::ProcessingError;
use crate::kitchen::Kitchen;
use crate::store::{OrderStatusStore, StatusUpdate};

/// A successfully handled order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOrder {
    pub order_id: String,
    pub update: StatusUpdate,
}

/// Runs the preparation pipeline for one delivery at a time
#[derive(Clone)]
pub struct OrderProcessor {
    kitchen: Arc<dyn Kitchen>,
    store: Arc<dyn OrderStatusStore>,
}

impl OrderProcessor {
    pub fn new(kitchen: Arc<dyn Kitchen>, store: Arc<dyn OrderStatusStore>) -> Self {
        Self { kitchen, store }
    }

    pub fn store(&self) -> &Arc<dyn OrderStatusStore> {
        &self.store
    }

    pub async fn process(&self, message: &RawMessage) -> Result<ProcessedOrder, ProcessingError> {
        let order = OrderMessage::decode(&message.payload).inspect_err(|e| {
            tracing::warn!(
                delivery_tag = message.delivery_tag,
                error = %e,
                "Undecodable order message"
            );
        })?;

        tracing::info!(
            order_id = %order.order_id,
            delivery_tag = message.delivery_tag,
            redelivered = message.redelivered,
            items = order.items.len(),
            "📨 Order received"
        );

        tracing::info!(order_id = %order.order_id, "⏳ Preparing order");
        if let Err(source) = self.kitchen.prepare(&order).await {
            tracing::error!(order_id = %order.order_id, error = %source, "Preparation failed");
            return Err(ProcessingError::Preparation {
                order_id: order.order_id,
                source,
            });
        }

        let update = match self
            .store
            .set_status(&order.order_id, OrderStatus::Preparing)
            .await
        {
            Ok(update) => update,
            Err(source) => {
                tracing::error!(
                    order_id = %order.order_id,
                    error = %source,
                    "Failed to update order status"
                );
                return Err(ProcessingError::Persistence {
                    order_id: order.order_id,
                    source,
                });
            }
        };

        match update {
            StatusUpdate::Applied => {
                tracing::info!(order_id = %order.order_id, "✅ Order moved to PREPARING");
            }
            StatusUpdate::Unchanged { current } => {
                tracing::info!(
                    order_id = %order.order_id,
                    current = %current,
                    "Order already past PENDING, status left unchanged"
                );
            }
        }

        Ok(ProcessedOrder {
            order_id: order.order_id,
            update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Acker;
    use crate::error::{ConnectionError, FailureClass};
    use crate::kitchen::KitchenError;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct NoopAcker;

    #[async_trait]
    impl Acker for NoopAcker {
        async fn ack(&self) -> Result<(), ConnectionError> {
            Ok(())
        }

        async fn nack(&self, _requeue: bool) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    struct StubKitchen {
        fail: bool,
    }

    #[async_trait]
    impl Kitchen for StubKitchen {
        async fn prepare(&self, _order: &OrderMessage) -> Result<(), KitchenError> {
            if self.fail {
                Err(KitchenError::Rejected("oven offline".into()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(String, OrderStatus)>>,
        missing: bool,
    }

    #[async_trait]
    impl OrderStatusStore for RecordingStore {
        async fn set_status(
            &self,
            order_id: &str,
            status: OrderStatus,
        ) -> Result<StatusUpdate, StoreError> {
            self.calls.lock().unwrap().push((order_id.to_string(), status));
            if self.missing {
                Err(StoreError::OrderNotFound(order_id.to_string()))
            } else {
                Ok(StatusUpdate::Applied)
            }
        }
    }

    fn message(payload: &str) -> RawMessage {
        RawMessage::new(1, false, payload.as_bytes().to_vec(), NoopAcker)
    }

    const ORD_1: &str = r#"{
        "orderId": "ORD-1",
        "userId": "U-1",
        "addressId": "A-1",
        "items": [{"productId": "P1", "quantity": 2, "price": 5.00}],
        "total": 10.00
    }"#;

    #[tokio::test]
    async fn test_well_formed_order_sets_preparing_once() {
        let store = Arc::new(RecordingStore::default());
        let processor = OrderProcessor::new(Arc::new(StubKitchen { fail: false }), store.clone());

        let processed = processor.process(&message(ORD_1)).await.unwrap();

        assert_eq!(processed.order_id, "ORD-1");
        assert_eq!(processed.update, StatusUpdate::Applied);
        assert_eq!(
            *store.calls.lock().unwrap(),
            vec![("ORD-1".to_string(), OrderStatus::Preparing)]
        );
    }

    #[tokio::test]
    async fn test_malformed_order_never_reaches_store() {
        let store = Arc::new(RecordingStore::default());
        let processor = OrderProcessor::new(Arc::new(StubKitchen { fail: false }), store.clone());

        let err = processor
            .process(&message(r#"{"orderId": 123}"#))
            .await
            .unwrap_err();

        assert_eq!(err.class(), FailureClass::Terminal);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_kitchen_failure_skips_status_update() {
        let store = Arc::new(RecordingStore::default());
        let processor = OrderProcessor::new(Arc::new(StubKitchen { fail: true }), store.clone());

        let err = processor.process(&message(ORD_1)).await.unwrap_err();

        assert!(matches!(err, ProcessingError::Preparation { .. }));
        assert_eq!(err.class(), FailureClass::Transient);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_a_persistence_error() {
        let store = Arc::new(RecordingStore {
            missing: true,
            ..RecordingStore::default()
        });
        let processor = OrderProcessor::new(Arc::new(StubKitchen { fail: false }), store.clone());

        let err = processor.process(&message(ORD_1)).await.unwrap_err();

        assert!(matches!(
            err,
            ProcessingError::Persistence { ref order_id, .. } if order_id == "ORD-1"
        ));
        assert_eq!(store.calls.lock().unwrap().len(), 1);
    }
}
