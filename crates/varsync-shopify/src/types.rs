//! Serde shapes for the Admin GraphQL responses we consume.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

impl GraphQlError {
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|code| code == "THROTTLED")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorExtensions {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: Option<PageInfo>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            page_info: None,
        }
    }
}

impl<T> Connection<T> {
    pub fn into_nodes(self) -> impl Iterator<Item = T> {
        self.edges.into_iter().map(|e| e.node)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProduct {
    pub id: String,
    pub title: String,
    pub handle: String,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub total_variants: Option<u32>,
    #[serde(default)]
    pub collections: Connection<RemoteCollectionRef>,
    #[serde(default)]
    pub images: Connection<RemoteImage>,
    #[serde(default)]
    pub variants: Connection<RemoteVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCollectionRef {
    pub id: String,
    pub title: String,
    pub handle: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteImage {
    pub id: Option<String>,
    pub url: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSelectedOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVariant {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub available_for_sale: Option<bool>,
    #[serde(default)]
    pub selected_options: Vec<RemoteSelectedOption>,
    pub image: Option<RemoteImage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCollection {
    pub id: String,
    pub title: String,
    pub handle: String,
    pub products_count: Option<ProductsCount>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ProductsCount {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProductsData {
    pub products: Connection<RemoteProduct>,
}

#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub product: Option<RemoteProduct>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionProductsData {
    pub collection: Option<CollectionProducts>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionProducts {
    pub products: Connection<RemoteProduct>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionsData {
    pub collections: Connection<RemoteCollection>,
}
