//! Order queue message
//!
//! JSON body published by the API when an order is placed. Field names
//! are camelCase on the wire; fields the worker does not know about
//! (e.g. `paymentMethod`) are ignored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use thiserror::Error;

/// A placed order, as carried by the order queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
    pub order_id: String,
    pub user_id: String,
    pub address_id: String,
    pub items: Vec<OrderMessageItem>,
    /// Expected to equal Σ price × quantity (producer invariant, not re-checked)
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Order line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessageItem {
    pub product_id: String,
    pub quantity: NonZeroU32,
    /// Unit price
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Why a payload could not be turned into an [`OrderMessage`]
///
/// Always terminal: the same bytes will fail the same way on every retry.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed order payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid order payload: `{field}` {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl OrderMessage {
    /// Decode and validate a queue payload
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let message: OrderMessage = serde_json::from_slice(payload)?;
        message.validate()?;
        Ok(message)
    }

    /// Encode as a queue payload
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Total number of units across all lines
    pub fn unit_count(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.order_id.trim().is_empty() {
            return Err(DecodeError::Invalid {
                field: "orderId",
                reason: "must not be empty",
            });
        }
        if self.total < Decimal::ZERO {
            return Err(DecodeError::Invalid {
                field: "total",
                reason: "must not be negative",
            });
        }
        if self
            .items
            .iter()
            .any(|item| item.price < Decimal::ZERO)
        {
            return Err(DecodeError::Invalid {
                field: "items.price",
                reason: "must not be negative",
            });
        }
        Ok(())
    }
}
