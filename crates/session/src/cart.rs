use storefront_model::{Cart, CartItem, Product};
use storefront_storage::{KeyValueStore, Persistence};

/// Owner of the session cart.
///
/// Every command swaps in a new [`Cart`] and persists it.
pub struct CartStore<S> {
    persistence: Persistence<S>,
    cart: Cart,
}

impl<S: KeyValueStore> CartStore<S> {
    /// Rehydrate the stored cart. Corrupt data is logged and dropped.
    pub fn open(persistence: Persistence<S>) -> Self {
        let raw = persistence.load_cart();
        let cart = match Cart::from_stored(&raw) {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, records = raw.len(), "Discarding corrupt stored cart");
                Cart::new()
            }
        };
        tracing::debug!(lines = cart.len(), "Cart rehydrated");

        Self { persistence, cart }
    }

    pub fn add_to_cart(&mut self, product: &Product) -> &Cart {
        let next = self.cart.add_product(product);
        self.replace(next)
    }

    pub fn remove_from_cart(&mut self, id: &str) -> &Cart {
        let next = self.cart.remove_item(id);
        self.replace(next)
    }

    /// Zero or less removes the line.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) -> &Cart {
        let next = self.cart.update_quantity(id, quantity);
        self.replace(next)
    }

    pub fn clear_cart(&mut self) -> &Cart {
        self.replace(Cart::new())
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn items(&self) -> &[CartItem] {
        self.cart.items()
    }

    pub fn item_count(&self) -> u64 {
        self.cart.item_count()
    }

    pub fn subtotal(&self) -> f64 {
        self.cart.subtotal()
    }

    pub fn discounted_price(&self, item: &CartItem) -> f64 {
        item.effective_price()
    }

    /// Write the current cart, e.g. on shutdown.
    pub fn flush(&self) {
        self.persistence.save_cart(&self.cart);
    }

    fn replace(&mut self, next: Cart) -> &Cart {
        self.cart = next;
        self.persistence.save_cart(&self.cart);
        &self.cart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use storefront_storage::{MemoryStore, CART_KEY};

    fn product(id: i64, price: f64) -> Product {
        Product::from_raw(&json!({ "id": id, "title": format!("P{}", id), "price": price }))
    }

    #[test]
    fn test_changes_are_persisted() {
        let persistence = Persistence::new(MemoryStore::new());
        let mut store = CartStore::open(persistence.clone());

        store.add_to_cart(&product(1, 10.0));
        store.add_to_cart(&product(1, 10.0));
        store.add_to_cart(&product(2, 2.5));
        store.update_quantity("2", 4);

        let reopened = CartStore::open(persistence.clone());
        assert_eq!(reopened.cart(), store.cart());
        assert_eq!(reopened.item_count(), 6);
        assert_eq!(reopened.subtotal(), 30.0);

        store.remove_from_cart("1");
        assert_eq!(CartStore::open(persistence.clone()).items().len(), 1);

        store.clear_cart();
        assert!(CartStore::open(persistence).items().is_empty());
    }

    #[test]
    fn test_corrupt_cart_starts_empty() {
        let store = MemoryStore::new();
        store.set(CART_KEY, r#"[{"id": 1, "quantity": 2}, "garbage"]"#).unwrap();

        let cart = CartStore::open(Persistence::new(store));

        assert!(cart.items().is_empty());
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_stored_quantities_are_repaired() {
        let store = MemoryStore::new();
        store
            .set(CART_KEY, r#"[{"id": "7", "title": "Lamp", "price": "12.5", "quantity": 0}]"#)
            .unwrap();

        let cart = CartStore::open(Persistence::new(store));

        assert_eq!(cart.items()[0].quantity, 1);
        assert_eq!(cart.subtotal(), 12.5);
    }

    #[test]
    fn test_discounted_price() {
        let mut store = CartStore::open(Persistence::new(MemoryStore::new()));
        let discounted = Product::from_raw(&json!({
            "id": 3,
            "title": "Chair",
            "price": 100,
            "discountPercentage": 15,
        }));
        store.add_to_cart(&discounted);

        let item = store.items()[0].clone();
        assert_eq!(store.discounted_price(&item), 85.0);
    }

    #[test]
    fn test_flush_writes_current_cart() {
        let persistence = Persistence::new(MemoryStore::new());
        let mut store = CartStore::open(persistence.clone());
        store.add_to_cart(&product(9, 1.0));
        persistence.store().remove(CART_KEY).unwrap();

        store.flush();

        assert_eq!(persistence.load_cart().len(), 1);
    }
}
