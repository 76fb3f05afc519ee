//! The remote catalog seam consumed by the sync orchestrator.

use std::future::Future;

use serde::Serialize;

use crate::catalog::ProductFields;
use crate::resolver::Variant;

/// One page of remote results plus the cursor to continue from.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Cursor for the following page, if the source says there is one.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        if self.has_next_page {
            self.end_cursor.as_deref()
        } else {
            None
        }
    }
}

/// A remote product reduced to what the catalog needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProduct {
    pub external_id: String,
    pub fields: ProductFields,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCollection {
    pub id: String,
    pub title: String,
    pub handle: String,
    pub products_count: Option<u64>,
}

/// A paginated remote catalog.
///
/// Raw records are transformed one at a time so a malformed record fails on
/// its own instead of failing the page it arrived on.
pub trait CatalogSource: Send + Sync {
    type Record: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_product_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> impl Future<Output = Result<Page<Self::Record>, Self::Error>> + Send;

    fn fetch_collection_product_page(
        &self,
        collection_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> impl Future<Output = Result<Page<Self::Record>, Self::Error>> + Send;

    fn fetch_collections(
        &self,
        page_size: u32,
    ) -> impl Future<Output = Result<Vec<SourceCollection>, Self::Error>> + Send;

    /// # Errors
    ///
    /// Returns the source's error when the record cannot be mapped.
    fn transform(&self, record: Self::Record) -> Result<SourceProduct, Self::Error>;
}
