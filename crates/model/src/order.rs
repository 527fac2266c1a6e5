use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProductId;

/// Shipping province. Only Quebec charges QST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Province {
    Quebec,
    Ontario,
    Alberta,
    #[serde(rename = "British Columbia")]
    BritishColumbia,
    Other,
}

impl Default for Province {
    fn default() -> Self {
        Self::Quebec
    }
}

impl From<&str> for Province {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "quebec" | "qc" => Self::Quebec,
            "ontario" | "on" => Self::Ontario,
            "alberta" | "ab" => Self::Alberta,
            "british columbia" | "bc" => Self::BritishColumbia,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quebec => "Quebec",
            Self::Ontario => "Ontario",
            Self::Alberta => "Alberta",
            Self::BritishColumbia => "British Columbia",
            Self::Other => "Other",
        })
    }
}

/// How the customer says they will pay. Nothing is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Credit,
    Paypal,
    Bank,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Credit => "credit",
            Self::Paypal => "paypal",
            Self::Bank => "bank",
        })
    }
}

/// Sanitized shipping address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub address: String,
    pub city: String,
    pub province: Province,
    /// Uppercase, no whitespace
    pub postal_code: String,
}

/// One purchased line, priced at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: ProductId,
    pub title: String,
    pub quantity: u32,
    /// Discounted unit price
    pub unit_price: f64,
    pub line_total: f64,
}

/// Money totals of an order, each rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub gst: f64,
    pub qst: f64,
    pub total: f64,
}

/// A placed order, kept locally for the confirmation view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Creation time in milliseconds
    pub id: i64,
    pub items: Vec<OrderLine>,
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub created_at: DateTime<Utc>,
}
