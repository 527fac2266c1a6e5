//! Catalog state held by the sync service.

use serde::Serialize;
use std::collections::HashMap;
use storefront_model::{Category, Product};

/// A memoized page result.
#[derive(Debug, Clone)]
pub(crate) struct CachedPage {
    pub items: Vec<Product>,
    pub total: u64,
}

/// Everything the service owns. Only ever touched under the service lock,
/// and never across a suspension point.
#[derive(Debug, Default)]
pub(crate) struct CatalogState {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub total: u64,
    pub loading: bool,
    pub error: String,
    pub category_error: String,
    /// Set while `products` came from the saved snapshot after a failure
    pub stale_notice: Option<String>,
    pub current_page: u32,
    pub current_limit: u32,
    /// `"{page}:{limit}"` -> page
    pub page_cache: HashMap<String, CachedPage>,
    /// Stringified id -> product
    pub product_cache: HashMap<String, Product>,
    /// Ticket of the newest page request
    pub latest_ticket: u64,
}

impl CatalogState {
    /// Issue a ticket that supersedes every earlier page request.
    pub fn next_ticket(&mut self) -> u64 {
        self.latest_ticket += 1;
        self.latest_ticket
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest_ticket == ticket
    }

    pub fn cache_products(&mut self, products: &[Product]) {
        for product in products {
            self.product_cache.insert(product.id.key(), product.clone());
        }
    }

    /// Replace a displayed product with the same id, or append it.
    pub fn upsert_product(&mut self, product: Product) {
        let key = product.id.key();
        match self.products.iter_mut().find(|p| p.id.key() == key) {
            Some(slot) => *slot = product,
            None => self.products.push(product),
        }
    }

    pub fn view(&self, page_size: u32) -> CatalogView {
        CatalogView {
            products: self.products.clone(),
            categories: self.categories.clone(),
            total: self.total,
            page_size,
            current_page: self.current_page.max(1),
            loading: self.loading,
            error: self.error.clone(),
            category_error: self.category_error.clone(),
            notice: self.notice(),
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        if !self.error.is_empty() {
            return Some(if self.products.is_empty() {
                Notice::Fatal(self.error.clone())
            } else {
                Notice::Degraded(self.error.clone())
            });
        }
        if let Some(stale) = &self.stale_notice {
            return Some(Notice::Degraded(stale.clone()));
        }
        if !self.category_error.is_empty() {
            return Some(Notice::Degraded(self.category_error.clone()));
        }
        None
    }
}

/// How a failure should be presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Notice {
    /// Nothing to show; the user has to retry
    Fatal(String),
    /// Data is shown, but it is stale or incomplete
    Degraded(String),
}

/// Read-only copy of the catalog state for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub total: u64,
    pub page_size: u32,
    pub current_page: u32,
    pub loading: bool,
    pub error: String,
    pub category_error: String,
    pub notice: Option<Notice>,
}

impl CatalogView {
    /// Number of pages at the current page size.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }
}
