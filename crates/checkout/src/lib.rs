//! Checkout: turns a cart and a shipping form into a placed order.
//!
//! No payment is taken. Placing an order sanitizes the form, prices each
//! line at its discounted unit price and applies Canadian sales taxes:
//! GST everywhere, QST on top for Quebec.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use storefront_model::{round2, Cart, Order, OrderLine, OrderTotals, PaymentMethod, Province, ShippingAddress};
use storefront_sanitize::{sanitize_string, LABEL_MAX};
use storefront_session::CartStore;
use storefront_storage::{KeyValueStore, Persistence};
use thiserror::Error;

/// Federal goods and services tax.
pub const GST_RATE: f64 = 0.05;
/// Quebec sales tax, charged in addition to GST.
pub const QST_RATE: f64 = 0.09975;

const ADDRESS_MAX: usize = 180;
const POSTAL_CODE_MAX: usize = 10;

/// Errors raised while placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Please fill all required fields.")]
    MissingFields,

    #[error("Your cart is empty.")]
    EmptyCart,
}

/// Raw checkout form input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub name: String,
    pub address: String,
    pub city: String,
    pub province: Province,
    pub postal_code: String,
    pub payment_method: PaymentMethod,
}

impl CheckoutForm {
    /// Sanitized copy of the address fields.
    pub fn shipping_address(&self) -> ShippingAddress {
        let postal_code: String = sanitize_string(&self.postal_code, Some(POSTAL_CODE_MAX))
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        ShippingAddress {
            name: sanitize_string(&self.name, Some(LABEL_MAX)),
            address: sanitize_string(&self.address, Some(ADDRESS_MAX)),
            city: sanitize_string(&self.city, Some(LABEL_MAX)),
            province: self.province,
            postal_code,
        }
    }
}

/// Compute totals for a subtotal shipped to `province`.
pub fn compute_totals(subtotal: f64, province: Province) -> OrderTotals {
    let subtotal = round2(subtotal);
    let gst = round2(subtotal * GST_RATE);
    let qst = if province == Province::Quebec {
        round2(subtotal * QST_RATE)
    } else {
        0.0
    };

    OrderTotals {
        subtotal,
        gst,
        qst,
        total: round2(subtotal + gst + qst),
    }
}

/// Validate the form and build the order for `cart`.
pub fn place_order(cart: &Cart, form: &CheckoutForm) -> Result<Order, CheckoutError> {
    let address = form.shipping_address();
    let required = [&address.name, &address.address, &address.city, &address.postal_code];
    if required.iter().any(|field| field.is_empty()) {
        return Err(CheckoutError::MissingFields);
    }
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let items: Vec<OrderLine> = cart
        .items()
        .iter()
        .map(|item| OrderLine {
            id: item.id.clone(),
            title: item.title.clone(),
            quantity: item.quantity,
            unit_price: item.effective_price(),
            line_total: item.line_total(),
        })
        .collect();

    let created_at = Utc::now();
    Ok(Order {
        id: created_at.timestamp_millis(),
        totals: compute_totals(cart.subtotal(), address.province),
        items,
        address,
        payment_method: form.payment_method,
        created_at,
    })
}

/// Place an order from the session cart, keep it as the last order and
/// empty the cart.
pub fn submit<S: KeyValueStore>(
    cart: &mut CartStore<S>,
    persistence: &Persistence<S>,
    form: &CheckoutForm,
) -> Result<Order, CheckoutError> {
    let order = place_order(cart.cart(), form)?;
    persistence.save_last_order(&order);
    cart.clear_cart();

    tracing::info!(
        order_id = order.id,
        lines = order.items.len(),
        total = order.totals.total,
        province = %order.address.province,
        "Order placed"
    );
    Ok(order)
}
