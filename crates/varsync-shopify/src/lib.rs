pub mod client;
pub mod domain;
pub mod error;
pub mod gid;
mod queries;
mod rate_limit;
pub mod transform;
pub mod types;

pub use client::{ShopifyClient, ShopifyClientConfig, MAX_PAGES, MAX_PAGE_SIZE};
pub use domain::normalize_shop_domain;
pub use error::ShopifyError;
pub use transform::{transform_collection, transform_product};
pub use types::RemoteProduct;
