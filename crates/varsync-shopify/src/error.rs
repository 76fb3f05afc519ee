use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("GraphQL errors from {context}: {messages}")]
    GraphQl { context: String, messages: String },

    #[error("rate limited by {shop_domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        shop_domain: String,
        retry_after_secs: u64,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("product not found: {external_id}")]
    ProductNotFound { external_id: String },

    #[error("collection not found: {collection_id}")]
    CollectionNotFound { collection_id: String },

    #[error("invalid shop domain \"{shop_domain}\": {reason}")]
    InvalidShopDomain { shop_domain: String, reason: String },

    #[error("missing Shopify credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("cannot transform product {external_id}: {reason}")]
    Transform { external_id: String, reason: String },

    #[error("pagination limit reached for {context}: exceeded {max_pages} pages")]
    PaginationLimit { context: String, max_pages: usize },
}
