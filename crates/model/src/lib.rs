//! Core domain model for the storefront.
//!
//! This crate defines the value types shared by every other crate:
//! - `Product`: a normalized, sanitized catalog record
//! - `Category`: a slugged category label
//! - `CartItem` / `Cart`: immutable-update cart values
//! - `Review`: a product review, from the API or the local user
//! - `Order`: the snapshot written when checkout completes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

mod cart;
mod order;
mod product;
mod review;

pub use cart::{Cart, CartItem, MAX_QUANTITY_PER_ITEM};
pub use order::{Order, OrderLine, OrderTotals, PaymentMethod, Province, ShippingAddress};
pub use product::{Category, Product, UNCATEGORIZED};
pub use review::{average_rating, Review};

/// Errors raised while rebuilding model values from stored data.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot build CartItem from invalid input: {0}")]
    InvalidCartItem(String),
}

static PLACEHOLDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identifier of a remote catalog record.
///
/// The remote API uses numbers, stored data may carry strings. All keyed
/// comparisons go through [`ProductId::key`] so both forms line up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    /// Numeric id as served by the catalog API
    Number(i64),
    /// Any other textual id
    Text(String),
}

impl ProductId {
    /// Read an id from an untyped value. Empty strings and non-scalars yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Number(i),
                None => Self::Text(n.to_string()),
            }),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.trim().to_string())),
            _ => None,
        }
    }

    /// Unique id for records that arrive without one: `product-<millis>-<n>`,
    /// where `n` is a process-wide sequence.
    pub fn placeholder() -> Self {
        let seq = PLACEHOLDER_SEQ.fetch_add(1, Ordering::Relaxed);
        Self::Text(format!("product-{}-{}", chrono::Utc::now().timestamp_millis(), seq))
    }

    /// Stringified form used as a cache and cart key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price after applying a percentage discount, rounded to cents.
pub fn effective_price(price: f64, discount_percentage: f64) -> f64 {
    if discount_percentage == 0.0 || !discount_percentage.is_finite() {
        return round2(price);
    }
    round2(price * (1.0 - discount_percentage / 100.0))
}

/// Coerce an untyped value to a finite number.
///
/// Numbers pass through, numeric strings are parsed, booleans count as 0/1.
/// Anything else, or a non-finite result, becomes 0.
pub(crate) fn coerce_number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}
