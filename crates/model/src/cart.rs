use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{coerce_number, effective_price, round2, ModelError, Product, ProductId};

/// Maximum quantity allowed per line item.
pub const MAX_QUANTITY_PER_ITEM: u32 = 9999;

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: ProductId,
    pub title: String,
    /// List price
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub thumbnail: String,
    /// Always in `1..=MAX_QUANTITY_PER_ITEM`
    pub quantity: u32,
}

impl CartItem {
    /// New line for a product at quantity 1.
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.title.clone(),
            price: product.price,
            discount_percentage: product.discount_percentage,
            thumbnail: product.thumbnail.clone(),
            quantity: 1,
        }
    }

    /// Rebuild a line from a stored record.
    ///
    /// Fails fast on anything that is not an object or has no id; numeric
    /// fields are coerced and the quantity forced into the valid range.
    pub fn from_stored(raw: &Value) -> Result<Self, ModelError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ModelError::InvalidCartItem(format!("expected object, got {}", kind(raw))))?;

        let id = obj
            .get("id")
            .and_then(ProductId::from_value)
            .ok_or_else(|| ModelError::InvalidCartItem("missing id".to_string()))?;

        Ok(Self {
            id,
            title: obj.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
            price: coerce_number(obj.get("price")),
            discount_percentage: coerce_number(obj.get("discountPercentage")),
            thumbnail: obj.get("thumbnail").and_then(Value::as_str).unwrap_or_default().to_string(),
            quantity: stored_quantity(obj.get("quantity")),
        })
    }

    /// Copy with a new quantity, capped at [`MAX_QUANTITY_PER_ITEM`].
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity: quantity.clamp(1, MAX_QUANTITY_PER_ITEM),
            ..self.clone()
        }
    }

    /// Unit price after discount, rounded to cents.
    pub fn effective_price(&self) -> f64 {
        effective_price(self.price, self.discount_percentage)
    }

    /// Unit price times quantity, rounded to cents.
    pub fn line_total(&self) -> f64 {
        round2(self.effective_price() * f64::from(self.quantity))
    }
}

/// The shopping cart.
///
/// Every operation returns a new cart and leaves the receiver untouched.
/// Holds at most one line per id; lines keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from lines. A later line with an already seen id
    /// replaces the earlier one in place.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut deduped: Vec<CartItem> = Vec::new();
        for item in items {
            match deduped.iter_mut().find(|existing| existing.id.key() == item.id.key()) {
                Some(slot) => *slot = item,
                None => deduped.push(item),
            }
        }
        Self { items: deduped }
    }

    /// Rehydrate from stored records. Any malformed record fails the whole cart.
    pub fn from_stored(raw: &[Value]) -> Result<Self, ModelError> {
        let items = raw
            .iter()
            .map(CartItem::from_stored)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_items(items))
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Look up a line by stringified id.
    pub fn get(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id.key() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add one unit of a product.
    pub fn add_product(&self, product: &Product) -> Self {
        let key = product.id.key();
        let mut next = self.items.clone();
        match next.iter_mut().find(|item| item.id.key() == key) {
            Some(item) => *item = item.with_quantity(item.quantity.saturating_add(1)),
            None => next.push(CartItem::from_product(product)),
        }
        Self { items: next }
    }

    /// Drop the line with this id, if any.
    pub fn remove_item(&self, id: &str) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|item| item.id.key() != id)
                .cloned()
                .collect(),
        }
    }

    /// Set a line's quantity. Zero or less removes the line; larger values
    /// are capped at [`MAX_QUANTITY_PER_ITEM`].
    pub fn update_quantity(&self, id: &str, quantity: i64) -> Self {
        if quantity <= 0 {
            return self.remove_item(id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(MAX_QUANTITY_PER_ITEM);
        Self {
            items: self
                .items
                .iter()
                .map(|item| {
                    if item.id.key() == id {
                        item.with_quantity(quantity)
                    } else {
                        item.clone()
                    }
                })
                .collect(),
        }
    }

    pub fn clear(&self) -> Self {
        Self::new()
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of line totals, rounded to cents.
    pub fn subtotal(&self) -> f64 {
        round2(self.items.iter().map(CartItem::line_total).sum())
    }
}

fn stored_quantity(value: Option<&Value>) -> u32 {
    let n = coerce_number(value);
    if n < 1.0 {
        return 1;
    }
    n.floor().min(f64::from(MAX_QUANTITY_PER_ITEM)) as u32
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
