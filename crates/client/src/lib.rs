//! Remote catalog client.
//!
//! Provides the `CatalogApi` trait and its HTTP implementation. Every call
//! is bounded by a per-attempt timeout and retried with linear backoff, so
//! callers only ever see "eventually succeeded" or "eventually failed".

use reqwest::header::ACCEPT;
use reqwest::Url;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

mod retry;

pub use retry::RetryPolicy;

/// Largest page the remote API serves.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Errors from catalog requests.
///
/// `Display` yields a message fit for end users; details go to the log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("Request timed out. Please retry.")]
    Timeout { timeout_ms: u64 },

    #[error("Request failed ({status})")]
    Http { status: u16 },

    #[error("Network error. Check your connection.")]
    Transport(String),

    #[error("Invalid response payload.")]
    Payload(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Timeouts, HTTP failures and transport failures are retried.
    /// A body that arrived but cannot be decoded is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Http { .. } | Self::Transport(_))
    }
}

/// Paging window for list and search calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Page size, always in `1..=MAX_PAGE_LIMIT`
    pub limit: u32,
    /// Records to skip
    pub skip: u32,
}

impl PageQuery {
    pub fn new(limit: u32, skip: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            skip,
        }
    }

    /// Window for a 1-based page number.
    pub fn for_page(page: u32, limit: u32) -> Self {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let page = page.max(1);
        Self::new(limit, (page - 1).saturating_mul(limit))
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(20, 0)
    }
}

/// One page of raw product records.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
    /// Raw, un-normalized records
    pub items: Vec<Value>,
    /// Record count across all pages
    pub total: u64,
}

/// Trait for catalog sources (the remote HTTP API, test doubles).
pub trait CatalogApi {
    /// List one page of products.
    fn list_products(
        &self,
        page: PageQuery,
    ) -> impl Future<Output = Result<ProductPage, ClientError>> + Send;

    /// Fetch a single raw product record.
    fn get_product(&self, id: &str) -> impl Future<Output = Result<Value, ClientError>> + Send;

    /// Fetch the raw category list (strings or `{name, slug}` objects).
    fn list_categories(&self) -> impl Future<Output = Result<Vec<Value>, ClientError>> + Send;

    /// Full-text search, paged like `list_products`.
    fn search_products(
        &self,
        query: &str,
        page: PageQuery,
    ) -> impl Future<Output = Result<ProductPage, ClientError>> + Send;

    /// Source name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP catalog client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://dummyjson.com`
    pub base_url: String,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts after the first
    pub max_retries: u32,
    /// Linear backoff step in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dummyjson.com".to_string(),
            timeout_ms: 8000,
            max_retries: 2,
            retry_backoff_ms: 300,
        }
    }
}

/// Catalog client backed by the remote REST API.
pub struct HttpCatalogClient {
    base: Url,
    timeout: Duration,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl HttpCatalogClient {
    /// Create a new client. Fails only on an unusable base URL or TLS setup.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Config(format!("{}: {}", config.base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Config(format!("{} cannot be a base URL", config.base_url)));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            base,
            timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_backoff_ms)),
            client,
        })
    }

    /// Build an endpoint URL from path segments; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET a JSON document, retrying per the policy.
    async fn get_json(&self, url: Url) -> Result<Value, ClientError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(url = %url, attempt, "Requesting catalog endpoint");

            match self.fetch_once(url.clone()).await {
                Ok(body) => return decode(&body),
                Err(err) if err.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        url = %url,
                        attempt,
                        error = ?err,
                        delay_ms = delay.as_millis() as u64,
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(
                        url = %url,
                        attempts = attempt,
                        max_attempts = self.retry.total_attempts(),
                        error = ?err,
                        "Catalog request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// One attempt, bounded by the timeout. Dropping the request future on
    /// timeout aborts the connection.
    async fn fetch_once(&self, url: Url) -> Result<String, ClientError> {
        let request = async {
            let response = self
                .client
                .get(url)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Http {
                    status: status.as_u16(),
                });
            }

            response
                .text()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn get_page(&self, mut url: Url, extra: Option<(&str, &str)>, page: PageQuery) -> Result<ProductPage, ClientError> {
        {
            let mut pairs = url.query_pairs_mut();
            if let Some((key, value)) = extra {
                pairs.append_pair(key, value);
            }
            pairs
                .append_pair("limit", &page.limit.to_string())
                .append_pair("skip", &page.skip.to_string());
        }
        let body = self.get_json(url).await?;
        parse_page(body)
    }
}

impl CatalogApi for HttpCatalogClient {
    async fn list_products(&self, page: PageQuery) -> Result<ProductPage, ClientError> {
        let url = self.endpoint(&["products"]);
        self.get_page(url, None, page).await
    }

    async fn get_product(&self, id: &str) -> Result<Value, ClientError> {
        let url = self.endpoint(&["products", id]);
        let body = self.get_json(url).await?;
        if !body.is_object() {
            return Err(ClientError::Payload("product is not an object".to_string()));
        }
        Ok(body)
    }

    async fn list_categories(&self) -> Result<Vec<Value>, ClientError> {
        let url = self.endpoint(&["products", "categories"]);
        match self.get_json(url).await? {
            Value::Array(categories) => Ok(categories),
            _ => Err(ClientError::Payload("categories is not an array".to_string())),
        }
    }

    async fn search_products(&self, query: &str, page: PageQuery) -> Result<ProductPage, ClientError> {
        let url = self.endpoint(&["products", "search"]);
        self.get_page(url, Some(("q", query)), page).await
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

fn decode(body: &str) -> Result<Value, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Payload(e.to_string()))
}

/// Split a `{ products, total }` body. A missing total falls back to the item count.
fn parse_page(body: Value) -> Result<ProductPage, ClientError> {
    let total = body.get("total").and_then(Value::as_u64);
    let items = match body {
        Value::Object(mut map) => match map.remove("products") {
            Some(Value::Array(items)) => items,
            _ => return Err(ClientError::Payload("missing products array".to_string())),
        },
        _ => return Err(ClientError::Payload("page is not an object".to_string())),
    };

    Ok(ProductPage {
        total: total.unwrap_or(items.len() as u64),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Clone)]
    enum Reply {
        Json(u16, String),
        Hang,
    }

    struct Responder {
        base_url: String,
        hits: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    /// Serve canned replies in order; the last one repeats.
    async fn respond_with(replies: Vec<Reply>) -> Responder {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (hits_srv, requests_srv) = (hits.clone(), requests.clone());
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                let n = hits_srv.fetch_add(1, Ordering::SeqCst);
                let reply = replies[n.min(replies.len() - 1)].clone();
                let requests = requests_srv.clone();

                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(read) => buf.extend_from_slice(&chunk[..read]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf).to_string();
                    requests.lock().unwrap().push(head.lines().next().unwrap_or_default().to_string());

                    match reply {
                        Reply::Hang => tokio::time::sleep(Duration::from_secs(5)).await,
                        Reply::Json(status, body) => {
                            let response = format!(
                                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                status,
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                    }
                });
            }
        });

        Responder {
            base_url: format!("http://{}", addr),
            hits,
            requests,
        }
    }

    fn client_for(responder: &Responder, timeout_ms: u64) -> HttpCatalogClient {
        HttpCatalogClient::new(ClientConfig {
            base_url: responder.base_url.clone(),
            timeout_ms,
            max_retries: 2,
            retry_backoff_ms: 1,
        })
        .unwrap()
    }

    fn ok(body: Value) -> Reply {
        Reply::Json(200, body.to_string())
    }

    #[test]
    fn test_page_query_clamps() {
        assert_eq!(PageQuery::new(0, 5), PageQuery { limit: 1, skip: 5 });
        assert_eq!(PageQuery::new(500, 0).limit, 100);
        assert_eq!(PageQuery::for_page(3, 20), PageQuery { limit: 20, skip: 40 });
        assert_eq!(PageQuery::for_page(0, 20).skip, 0);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::Timeout { timeout_ms: 1 }.is_retryable());
        assert!(ClientError::Http { status: 500 }.is_retryable());
        assert!(!ClientError::Payload("x".into()).is_retryable());
        assert_eq!(ClientError::Http { status: 503 }.to_string(), "Request failed (503)");
    }

    #[test]
    fn test_parse_page_total_fallback() {
        let page = parse_page(json!({ "products": [{ "id": 1 }, { "id": 2 }] })).unwrap();
        assert_eq!(page.total, 2);
        assert!(matches!(parse_page(json!([])), Err(ClientError::Payload(_))));
    }

    #[test]
    fn test_endpoint_encodes_id() {
        let client = HttpCatalogClient::new(ClientConfig {
            base_url: "https://api.example/v1/".to_string(),
            ..Default::default()
        })
        .unwrap();
        let url = client.endpoint(&["products", "a/b c"]);
        assert_eq!(url.as_str(), "https://api.example/v1/products/a%2Fb%20c");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let result = HttpCatalogClient::new(ClientConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_list_products_sends_clamped_window() {
        let responder = respond_with(vec![ok(json!({
            "products": [{ "id": 1 }, { "id": 2 }],
            "total": 194
        }))])
        .await;
        let client = client_for(&responder, 2000);

        let page = client.list_products(PageQuery::new(500, 40)).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 194);
        let requests = responder.requests.lock().unwrap().clone();
        assert_eq!(requests, vec!["GET /products?limit=100&skip=40 HTTP/1.1".to_string()]);
    }

    #[tokio::test]
    async fn test_search_encodes_query() {
        let responder = respond_with(vec![ok(json!({ "products": [], "total": 0 }))]).await;
        let client = client_for(&responder, 2000);

        client.search_products("red phone", PageQuery::default()).await.unwrap();

        let requests = responder.requests.lock().unwrap().clone();
        assert!(requests[0].starts_with("GET /products/search?q=red+phone&limit=20&skip=0"));
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let responder = respond_with(vec![
            Reply::Json(503, "{}".to_string()),
            ok(json!({ "id": 42, "title": "Laptop" })),
        ])
        .await;
        let client = client_for(&responder, 2000);

        let product = client.get_product("42").await.unwrap();

        assert_eq!(product["title"], "Laptop");
        assert_eq!(responder.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_http_error_after_retries() {
        let responder = respond_with(vec![Reply::Json(404, "{}".to_string())]).await;
        let client = client_for(&responder, 2000);

        let err = client.get_product("missing").await.unwrap_err();

        assert_eq!(err, ClientError::Http { status: 404 });
        assert_eq!(responder.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_after_retries() {
        let responder = respond_with(vec![Reply::Hang]).await;
        let client = client_for(&responder, 50);

        let err = client.list_categories().await.unwrap_err();

        assert_eq!(err, ClientError::Timeout { timeout_ms: 50 });
        assert_eq!(responder.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retried() {
        let responder = respond_with(vec![Reply::Json(200, "<html>oops</html>".to_string())]).await;
        let client = client_for(&responder, 2000);

        let err = client.list_categories().await.unwrap_err();

        assert!(matches!(err, ClientError::Payload(_)));
        assert_eq!(err.to_string(), "Invalid response payload.");
        assert_eq!(responder.hits.load(Ordering::SeqCst), 1);
    }
}
