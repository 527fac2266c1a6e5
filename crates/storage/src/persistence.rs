//! Typed persistence of storefront state.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use storefront_model::{Cart, Order, Review};

use crate::{KeyValueStore, StorageError};

pub const CART_KEY: &str = "cart";
pub const REVIEWS_KEY: &str = "reviews";
pub const LAST_ORDER_KEY: &str = "lastOrder";
pub const CATALOG_SNAPSHOT_KEY: &str = "catalogSnapshot";

/// Locally saved copy of the first catalog page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Raw records as the API served them
    pub items: Vec<Value>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub saved_at: DateTime<Utc>,
    /// Catalog size when the snapshot was taken
    pub total: u64,
    pub page_size: u32,
}

/// Best-effort typed access to a [`KeyValueStore`].
///
/// Reads never fail: missing or corrupt entries come back as a neutral
/// default. Writes never fail either; errors are logged and dropped.
pub struct Persistence<S> {
    store: Arc<S>,
}

impl<S> Clone for Persistence<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored cart lines as plain records. Rebuilding them is the caller's call.
    pub fn load_cart(&self) -> Vec<Value> {
        self.load(CART_KEY).unwrap_or_default()
    }

    pub fn save_cart(&self, cart: &Cart) {
        self.save(CART_KEY, cart);
    }

    /// User reviews keyed by product id.
    pub fn load_reviews(&self) -> HashMap<String, Vec<Review>> {
        self.load(REVIEWS_KEY).unwrap_or_default()
    }

    pub fn save_reviews(&self, reviews: &HashMap<String, Vec<Review>>) {
        self.save(REVIEWS_KEY, reviews);
    }

    pub fn load_last_order(&self) -> Option<Order> {
        self.load(LAST_ORDER_KEY)
    }

    pub fn save_last_order(&self, order: &Order) {
        self.save(LAST_ORDER_KEY, order);
    }

    pub fn load_catalog_snapshot(&self) -> Option<CatalogSnapshot> {
        self.load(CATALOG_SNAPSHOT_KEY)
    }

    /// Save raw records of the first page for cold starts and outages.
    pub fn save_catalog_snapshot(&self, items: &[Value], total: u64, page_size: u32) {
        let snapshot = CatalogSnapshot {
            items: items.to_vec(),
            metadata: SnapshotMetadata {
                saved_at: Utc::now(),
                total,
                page_size,
            },
        };
        self.save(CATALOG_SNAPSHOT_KEY, &snapshot);
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read local storage");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring corrupt local storage entry");
                None
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|json| self.store.set(key, &json));

        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Failed to write local storage");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use storefront_model::Product;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Poisoned)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn test_missing_entries_default() {
        let persistence = Persistence::new(MemoryStore::new());
        assert!(persistence.load_cart().is_empty());
        assert!(persistence.load_reviews().is_empty());
        assert!(persistence.load_last_order().is_none());
        assert!(persistence.load_catalog_snapshot().is_none());
    }

    #[test]
    fn test_corrupt_entries_default() {
        let store = MemoryStore::new();
        store.set(CART_KEY, "{not json").unwrap();
        store.set(REVIEWS_KEY, "[1,2,3]").unwrap();
        store.set(CATALOG_SNAPSHOT_KEY, "\"x\"").unwrap();
        let persistence = Persistence::new(store);

        assert!(persistence.load_cart().is_empty());
        assert!(persistence.load_reviews().is_empty());
        assert!(persistence.load_catalog_snapshot().is_none());
    }

    #[test]
    fn test_cart_is_saved_as_plain_records() {
        let persistence = Persistence::new(MemoryStore::new());
        let product = Product::from_raw(&json!({ "id": 5, "title": "Mug", "price": 8 }));
        let cart = Cart::new().add_product(&product).add_product(&product);

        persistence.save_cart(&cart);
        let stored = persistence.load_cart();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["id"], json!(5));
        assert_eq!(stored[0]["quantity"], json!(2));
        assert_eq!(Cart::from_stored(&stored).unwrap(), cart);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let persistence = Persistence::new(MemoryStore::new());
        let items = vec![json!({ "id": 1 }), json!({ "id": 2 })];

        persistence.save_catalog_snapshot(&items, 194, 20);
        let snapshot = persistence.load_catalog_snapshot().unwrap();

        assert_eq!(snapshot.items, items);
        assert_eq!(snapshot.metadata.total, 194);
        assert_eq!(snapshot.metadata.page_size, 20);

        let raw = persistence.store().get(CATALOG_SNAPSHOT_KEY).unwrap().unwrap();
        assert!(raw.contains("\"savedAt\""));
    }

    #[test]
    fn test_store_failures_are_swallowed() {
        let persistence = Persistence::new(BrokenStore);
        persistence.save_cart(&Cart::new());
        assert!(persistence.load_cart().is_empty());
        assert!(persistence.load_last_order().is_none());
    }
}
