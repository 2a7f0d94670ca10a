//! Product catalog endpoints, with short-lived caching.
//!
//! Product reads are cached via `moka` with a 5-minute TTL: long enough to
//! keep browsing snappy, short enough that checkout-adjacent flows see
//! fresh prices (checkout itself always re-fetches).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use threadline_core::{ProductId, UserId};

use super::ensure_success;
use crate::error::ClientError;
use crate::transport::ApiClient;

const CACHE_CAPACITY: u64 = 1000;
const CACHE_TTL: Duration = Duration::from_secs(300); // 5 minutes

/// A product as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub designer_id: Option<UserId>,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Deserialize)]
struct ProductResponse {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Product>,
}

#[derive(Deserialize)]
struct ProductListResponse {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<Product>>,
}

#[derive(Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(Vec<Product>),
}

/// Client for the product catalog.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    client: ApiClient,
    cache: Cache<String, CacheValue>,
}

impl CatalogService {
    /// Create the service with its response cache.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(CatalogInner { client, cache }),
        }
    }

    /// `GET /product/getproduct/:id`, cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is missing or the request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, ClientError> {
        let cache_key = format!("product:{product_id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for product");
            return Ok(*product);
        }

        let response: ProductResponse = self
            .inner
            .client
            .get_json(&format!("/product/getproduct/{product_id}"))
            .await?;
        ensure_success(&response.message_type, response.message.as_deref())?;

        let product = response
            .data
            .ok_or_else(|| ClientError::Api(format!("product not found: {product_id}")))?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// `GET /product/getallproducts`, cached under a single list key.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_all_products(&self) -> Result<Vec<Product>, ClientError> {
        let cache_key = "products:all".to_string();

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for product list");
            return Ok(products);
        }

        let response: ProductListResponse =
            self.inner.client.get_json("/product/getallproducts").await?;
        ensure_success(&response.message_type, response.message.as_deref())?;

        let products = response.data.unwrap_or_default();

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Invalidate one cached product.
    pub async fn invalidate(&self, product_id: &ProductId) {
        self.inner
            .cache
            .invalidate(&format!("product:{product_id}"))
            .await;
    }

    /// Invalidate all cached catalog data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}
