//! HTTP client for the Shopify Admin GraphQL API.

mod fetch_all;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use varsync_core::{AppConfig, CatalogSource, Page, SourceCollection, SourceProduct};

use crate::domain::normalize_shop_domain;
use crate::error::ShopifyError;
use crate::gid::to_gid;
use crate::queries;
use crate::rate_limit::retry_with_backoff;
use crate::transform::transform_product;
use crate::types::{
    CollectionProductsData, Connection, GraphQlResponse, ProductData, ProductsData, RemoteProduct,
};

/// Largest `first:` argument the Admin API accepts.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Safety cap on pages followed by a multi-page fetch.
pub const MAX_PAGES: usize = 200;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Retry-After used when Shopify throttles through a GraphQL error rather
/// than a 429 (no header is sent in that case).
const THROTTLED_RETRY_AFTER_SECS: u64 = 1;

#[derive(Clone)]
pub struct ShopifyClientConfig {
    pub shop_domain: String,
    pub access_token: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl std::fmt::Debug for ShopifyClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClientConfig")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[redacted]")
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

impl ShopifyClientConfig {
    /// # Errors
    ///
    /// Returns [`ShopifyError::MissingCredentials`] when the shop domain or
    /// access token is not configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ShopifyError> {
        let shop_domain = config
            .shop_domain
            .clone()
            .ok_or(ShopifyError::MissingCredentials("SHOPIFY_SHOP_DOMAIN"))?;
        let access_token = config
            .shopify_access_token
            .clone()
            .ok_or(ShopifyError::MissingCredentials("SHOPIFY_ACCESS_TOKEN"))?;
        Ok(Self {
            shop_domain,
            access_token,
            api_version: config.shopify_api_version.clone(),
            timeout_secs: config.http_timeout_secs,
            user_agent: config.http_user_agent.clone(),
            max_retries: config.http_max_retries,
            backoff_base_ms: config.http_backoff_base_ms,
        })
    }
}

/// Client for one shop's Admin GraphQL endpoint.
///
/// Throttling (HTTP 429 or a `THROTTLED` GraphQL error) is retried with
/// jittered exponential back-off up to `max_retries` extra attempts. Every
/// other failure is returned as-is.
pub struct ShopifyClient {
    client: Client,
    endpoint: String,
    shop_domain: String,
    access_token: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ShopifyClient {
    /// Creates a client for `https://{shop}/admin/api/{version}/graphql.json`.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::InvalidShopDomain`] for an unusable domain, or
    /// [`ShopifyError::Http`] if the underlying `reqwest::Client` cannot be
    /// constructed.
    pub fn new(config: &ShopifyClientConfig) -> Result<Self, ShopifyError> {
        let shop_domain = normalize_shop_domain(&config.shop_domain)?;
        let endpoint = format!(
            "https://{shop_domain}/admin/api/{}/graphql.json",
            config.api_version
        );
        Self::build(config, shop_domain, endpoint)
    }

    /// Creates a client that posts to an explicit endpoint (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_endpoint(
        config: &ShopifyClientConfig,
        endpoint: &str,
    ) -> Result<Self, ShopifyError> {
        Self::build(config, config.shop_domain.clone(), endpoint.to_owned())
    }

    fn build(
        config: &ShopifyClientConfig,
        shop_domain: String,
        endpoint: String,
    ) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            shop_domain,
            access_token: config.access_token.clone(),
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts one GraphQL document and decodes `data` as `T`.
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        context: &str,
    ) -> Result<T, ShopifyError> {
        let body = json!({ "query": query, "variables": variables });

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let body = &body;
            async move {
                let response = self
                    .client
                    .post(&self.endpoint)
                    .header(ACCESS_TOKEN_HEADER, &self.access_token)
                    .json(body)
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .map_or(2, ceil_secs);
                    return Err(ShopifyError::RateLimited {
                        shop_domain: self.shop_domain.clone(),
                        retry_after_secs,
                    });
                }

                if !status.is_success() {
                    return Err(ShopifyError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: self.endpoint.clone(),
                    });
                }

                let text = response.text().await?;
                let parsed: GraphQlResponse<T> =
                    serde_json::from_str(&text).map_err(|e| ShopifyError::Deserialize {
                        context: context.to_owned(),
                        source: e,
                    })?;

                if parsed.errors.iter().any(|e| e.is_throttled()) {
                    return Err(ShopifyError::RateLimited {
                        shop_domain: self.shop_domain.clone(),
                        retry_after_secs: THROTTLED_RETRY_AFTER_SECS,
                    });
                }
                if !parsed.errors.is_empty() {
                    let messages = parsed
                        .errors
                        .iter()
                        .map(|e| e.message.as_str())
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Err(ShopifyError::GraphQl {
                        context: context.to_owned(),
                        messages,
                    });
                }

                parsed.data.ok_or_else(|| ShopifyError::GraphQl {
                    context: context.to_owned(),
                    messages: "response carried no data".to_owned(),
                })
            }
        })
        .await
    }

    /// Fetches one page of products.
    ///
    /// # Errors
    ///
    /// Propagates any transport, status, GraphQL, or decode failure.
    pub async fn products_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page<RemoteProduct>, ShopifyError> {
        let data: ProductsData = self
            .graphql(
                &queries::products_query(),
                json!({ "first": clamp_page_size(page_size), "after": cursor }),
                "products page",
            )
            .await?;
        Ok(into_page(data.products))
    }

    /// Fetches and transforms a single product by id (plain or global).
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::ProductNotFound`] when no such product exists,
    /// [`ShopifyError::Transform`] when it cannot be mapped, or any transport,
    /// status, GraphQL, or decode failure.
    pub async fn product(&self, external_id: &str) -> Result<SourceProduct, ShopifyError> {
        let data: ProductData = self
            .graphql(
                &queries::product_query(),
                json!({ "id": to_gid("Product", external_id) }),
                "product",
            )
            .await?;
        let remote = data.product.ok_or_else(|| ShopifyError::ProductNotFound {
            external_id: external_id.to_owned(),
        })?;
        transform_product(remote)
    }

    /// Fetches one page of a collection's products.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::CollectionNotFound`] when the collection does
    /// not exist, or any transport, status, GraphQL, or decode failure.
    pub async fn collection_products_page(
        &self,
        collection_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page<RemoteProduct>, ShopifyError> {
        let data: CollectionProductsData = self
            .graphql(
                &queries::collection_products_query(),
                json!({
                    "id": to_gid("Collection", collection_id),
                    "first": clamp_page_size(page_size),
                    "after": cursor,
                }),
                "collection products page",
            )
            .await?;
        let collection = data
            .collection
            .ok_or_else(|| ShopifyError::CollectionNotFound {
                collection_id: collection_id.to_owned(),
            })?;
        Ok(into_page(collection.products))
    }
}

fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ceil_secs(header_secs: f64) -> u64 {
    header_secs.max(0.0).ceil() as u64
}

fn into_page<T>(connection: Connection<T>) -> Page<T> {
    let (has_next_page, end_cursor) = connection
        .page_info
        .as_ref()
        .map_or((false, None), |p| (p.has_next_page, p.end_cursor.clone()));
    Page {
        records: connection.into_nodes().collect(),
        has_next_page,
        end_cursor,
    }
}

impl CatalogSource for ShopifyClient {
    type Record = RemoteProduct;
    type Error = ShopifyError;

    async fn fetch_product_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page<RemoteProduct>, ShopifyError> {
        self.products_page(cursor, page_size).await
    }

    async fn fetch_collection_product_page(
        &self,
        collection_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page<RemoteProduct>, ShopifyError> {
        self.collection_products_page(collection_id, cursor, page_size)
            .await
    }

    async fn fetch_collections(&self, page_size: u32) -> Result<Vec<SourceCollection>, ShopifyError> {
        self.all_collections(page_size).await
    }

    fn transform(&self, record: RemoteProduct) -> Result<SourceProduct, ShopifyError> {
        transform_product(record)
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
