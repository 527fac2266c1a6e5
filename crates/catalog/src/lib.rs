//! Catalog cache and sync service.
//!
//! Owns the product and category state shown to the user and mediates
//! every remote fetch through two in-memory caches:
//! - a page cache keyed by `"{page}:{limit}"`, cleared on refresh
//! - a product cache keyed by stringified id, kept for the session
//!
//! The first page is also saved to local storage so a cold start or a
//! remote outage can still show something.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use storefront_client::{CatalogApi, ClientError, PageQuery, ProductPage, MAX_PAGE_LIMIT};
use storefront_model::{Category, Product};
use storefront_storage::{KeyValueStore, Persistence};
use tokio_util::sync::CancellationToken;

mod listing;
mod state;

pub use listing::{apply_list_options, select_deals, ListOptions, ParseSortOrderError, SortOrder};
pub use state::{CatalogView, Notice};
use state::{CachedPage, CatalogState};

/// Catalog service configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Default page size
    pub page_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub items: Vec<Product>,
    pub total: u64,
}

/// The single owner of catalog state.
///
/// Methods take `&self` so independent loads (products and categories) can
/// run concurrently; state is only touched between suspension points.
pub struct CatalogService<C, S> {
    api: Arc<C>,
    persistence: Persistence<S>,
    config: CatalogConfig,
    state: Mutex<CatalogState>,
}

impl<C: CatalogApi, S: KeyValueStore> CatalogService<C, S> {
    pub fn new(api: Arc<C>, persistence: Persistence<S>, config: CatalogConfig) -> Self {
        let page_size = config.page_size.clamp(1, MAX_PAGE_LIMIT);
        Self {
            api,
            persistence,
            config: CatalogConfig { page_size },
            state: Mutex::new(CatalogState {
                current_page: 1,
                current_limit: page_size,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Show the saved snapshot right away, then fetch fresh data.
    pub async fn mount(&self) {
        self.hydrate_from_snapshot();
        self.refresh_catalog().await;
    }

    /// Fill `products`/`total` from the local snapshot, if one exists.
    pub fn hydrate_from_snapshot(&self) -> bool {
        let Some(snapshot) = self.persistence.load_catalog_snapshot() else {
            return false;
        };
        let items: Vec<Product> = snapshot.items.iter().map(Product::from_raw).collect();
        tracing::debug!(count = items.len(), saved_at = %snapshot.metadata.saved_at, "Hydrated catalog from snapshot");

        let mut state = self.state();
        state.products = items;
        state.total = snapshot.metadata.total;
        true
    }

    /// Drop cached pages and reload page 1 and the categories together.
    ///
    /// Displayed products and the product cache are kept, so the list never
    /// flashes empty while the reload is in flight.
    pub async fn refresh_catalog(&self) {
        self.state().page_cache.clear();
        let page_size = self.config.page_size;
        tokio::join!(self.load_page(1, page_size), self.load_categories());
    }

    /// Load one page. A `limit` of 0 means the configured page size.
    ///
    /// Cache hits return without touching the network. On failure page 1
    /// falls back to the local snapshot; otherwise `error` is set and an
    /// empty list returned.
    pub async fn load_page(&self, page: u32, limit: u32) -> Vec<Product> {
        self.load_page_inner(page, limit, None).await
    }

    /// Like [`load_page`](Self::load_page), but gives up without touching
    /// state when `cancel` fires first.
    pub async fn load_page_until(&self, page: u32, limit: u32, cancel: &CancellationToken) -> Vec<Product> {
        self.load_page_inner(page, limit, Some(cancel)).await
    }

    /// Cold start for a single page. The snapshot only covers page 1, so
    /// other pages start empty rather than showing page 1's records.
    pub async fn open_page(&self, page: u32, limit: u32) -> Vec<Product> {
        if page <= 1 {
            self.hydrate_from_snapshot();
        }
        self.load_page(page, limit).await
    }

    /// Reload the last requested page.
    pub async fn retry_load(&self) -> Vec<Product> {
        let (page, limit) = {
            let state = self.state();
            (state.current_page, state.current_limit)
        };
        self.load_page(page, limit).await
    }

    async fn load_page_inner(&self, page: u32, limit: u32, cancel: Option<&CancellationToken>) -> Vec<Product> {
        let page = page.max(1);
        let limit = self.effective_limit(limit);
        let key = page_key(page, limit);

        let ticket = {
            let mut state = self.state();
            state.current_page = page;
            state.current_limit = limit;
            let ticket = state.next_ticket();

            if let Some(cached) = state.page_cache.get(&key).cloned() {
                tracing::debug!(page, limit, "Page cache hit");
                state.products = cached.items.clone();
                state.total = cached.total;
                state.loading = false;
                state.error.clear();
                state.stale_notice = None;
                return cached.items;
            }

            state.loading = true;
            state.error.clear();
            ticket
        };

        tracing::debug!(page, limit, ticket, source = self.api.name(), "Loading catalog page");
        let request = self.api.list_products(PageQuery::for_page(page, limit));
        let result = match cancel {
            Some(token) => tokio::select! {
                result = request => Some(result),
                _ = token.cancelled() => None,
            },
            None => Some(request.await),
        };

        match result {
            Some(Ok(fetched)) => self.apply_page(ticket, page, limit, key, fetched),
            Some(Err(err)) => self.apply_failure(ticket, page, limit, err),
            None => {
                tracing::debug!(page, limit, "Page load cancelled");
                let mut state = self.state();
                if state.is_current(ticket) {
                    state.loading = false;
                }
                Vec::new()
            }
        }
    }

    fn apply_page(&self, ticket: u64, page: u32, limit: u32, key: String, fetched: ProductPage) -> Vec<Product> {
        let items: Vec<Product> = fetched.items.iter().map(Product::from_raw).collect();
        if page == 1 {
            self.persistence.save_catalog_snapshot(&fetched.items, fetched.total, limit);
        }

        let mut state = self.state();
        state.page_cache.insert(
            key,
            CachedPage {
                items: items.clone(),
                total: fetched.total,
            },
        );
        state.cache_products(&items);

        if state.is_current(ticket) {
            state.products = items.clone();
            state.total = fetched.total;
            state.loading = false;
            state.error.clear();
            state.stale_notice = None;
        } else {
            tracing::debug!(page, limit, ticket, "Superseded page response cached but not shown");
        }

        tracing::info!(page, limit, count = items.len(), total = fetched.total, "Loaded catalog page");
        items
    }

    fn apply_failure(&self, ticket: u64, page: u32, limit: u32, err: ClientError) -> Vec<Product> {
        let message = err.to_string();
        let snapshot = if page == 1 {
            self.persistence.load_catalog_snapshot()
        } else {
            None
        };

        let mut state = self.state();
        let current = state.is_current(ticket);

        if let Some(snapshot) = snapshot {
            let items: Vec<Product> = snapshot.items.iter().map(Product::from_raw).collect();
            tracing::warn!(page, limit, error = ?err, count = items.len(), "Catalog unavailable, serving saved snapshot");
            if current {
                state.products = items.clone();
                state.total = snapshot.metadata.total;
                state.loading = false;
                state.error.clear();
                state.stale_notice = Some(format!("Showing saved catalog. {}", message));
            }
            return items;
        }

        tracing::warn!(page, limit, error = ?err, "Failed to load catalog page");
        if current {
            state.loading = false;
            state.error = message;
        }
        Vec::new()
    }

    /// Load categories. Failures only set `category_error`.
    pub async fn load_categories(&self) -> Vec<Category> {
        match self.api.list_categories().await {
            Ok(raw) => {
                let categories = dedupe_categories(raw.iter().map(Category::from_raw));
                tracing::debug!(count = categories.len(), "Loaded categories");
                let mut state = self.state();
                state.categories = categories.clone();
                state.category_error.clear();
                categories
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to load categories");
                self.state().category_error = err.to_string();
                Vec::new()
            }
        }
    }

    /// Cache-only lookup; never touches the network.
    pub fn get_product_from_cache(&self, id: &str) -> Option<Product> {
        self.state().product_cache.get(id).cloned()
    }

    /// Fetch one product, from cache when known.
    ///
    /// A fetched product is cached and merged into the displayed list.
    pub async fn load_product_by_id(&self, id: &str) -> Result<Product, ClientError> {
        if let Some(product) = self.get_product_from_cache(id) {
            return Ok(product);
        }

        match self.api.get_product(id).await {
            Ok(raw) => {
                let product = Product::from_raw(&raw);
                let mut state = self.state();
                state.product_cache.insert(id.to_string(), product.clone());
                state.product_cache.insert(product.id.key(), product.clone());
                state.upsert_product(product.clone());
                Ok(product)
            }
            Err(err) => {
                tracing::warn!(id, error = ?err, "Failed to load product");
                self.state().error = err.to_string();
                Err(err)
            }
        }
    }

    /// Remote search. Results feed the product cache but not the page cache
    /// or the displayed list.
    pub async fn search(&self, query: &str, page: u32, limit: u32) -> Result<SearchResults, ClientError> {
        let limit = self.effective_limit(limit);
        let fetched = self
            .api
            .search_products(query, PageQuery::for_page(page, limit))
            .await?;

        let items: Vec<Product> = fetched.items.iter().map(Product::from_raw).collect();
        self.state().cache_products(&items);
        tracing::debug!(query, count = items.len(), total = fetched.total, "Search completed");

        Ok(SearchResults {
            items,
            total: fetched.total,
        })
    }

    /// Filter the displayed products locally.
    pub fn filter_products(&self, term: &str, category_id: Option<&str>) -> Vec<Product> {
        self.browse(&ListOptions {
            search: term.to_string(),
            category: category_id.map(str::to_string),
            ..Default::default()
        })
    }

    /// Filter and sort the displayed products locally.
    pub fn browse(&self, options: &ListOptions) -> Vec<Product> {
        apply_list_options(&self.state().products, options)
    }

    /// Discounted products from the displayed page, largest discount first.
    pub fn deals(&self) -> Vec<Product> {
        select_deals(&self.state().products)
    }

    pub fn products(&self) -> Vec<Product> {
        self.state().products.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.state().categories.clone()
    }

    pub fn total(&self) -> u64 {
        self.state().total
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    pub fn loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> String {
        self.state().error.clone()
    }

    pub fn category_error(&self) -> String {
        self.state().category_error.clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.state().notice()
    }

    /// Copy of the whole presentation state.
    pub fn view(&self) -> CatalogView {
        self.state().view(self.config.page_size)
    }

    fn effective_limit(&self, limit: u32) -> u32 {
        if limit == 0 {
            self.config.page_size
        } else {
            limit.min(MAX_PAGE_LIMIT)
        }
    }
}

fn page_key(page: u32, limit: u32) -> String {
    format!("{}:{}", page, limit)
}

/// Keep the first category seen for each slug.
pub fn dedupe_categories(categories: impl IntoIterator<Item = Category>) -> Vec<Category> {
    let mut seen = HashSet::new();
    categories
        .into_iter()
        .filter(|category| seen.insert(category.id.clone()))
        .collect()
}
