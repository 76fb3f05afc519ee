//! Multi-page fetch loops for `ShopifyClient`.

use serde_json::json;
use varsync_core::SourceCollection;

use crate::error::ShopifyError;
use crate::queries::COLLECTIONS_QUERY;
use crate::transform::transform_collection;
use crate::types::CollectionsData;

use super::{clamp_page_size, ShopifyClient, MAX_PAGES};

impl ShopifyClient {
    /// Fetches every collection in the shop, following cursors to the end.
    ///
    /// On any page failure the collections gathered so far are discarded and
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates any page error. Returns [`ShopifyError::PaginationLimit`]
    /// if the number of pages exceeds [`MAX_PAGES`].
    pub async fn all_collections(
        &self,
        page_size: u32,
    ) -> Result<Vec<SourceCollection>, ShopifyError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(ShopifyError::PaginationLimit {
                    context: "collections".to_owned(),
                    max_pages: MAX_PAGES,
                });
            }

            let data: CollectionsData = self
                .graphql(
                    COLLECTIONS_QUERY,
                    json!({ "first": clamp_page_size(page_size), "after": cursor }),
                    "collections page",
                )
                .await?;

            let (has_next, end_cursor) = data
                .collections
                .page_info
                .as_ref()
                .map_or((false, None), |p| (p.has_next_page, p.end_cursor.clone()));
            all.extend(data.collections.into_nodes().map(transform_collection));

            cursor = if has_next { end_cursor } else { None };
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(
            shop_domain = %self.shop_domain,
            pages = page_count,
            collections = all.len(),
            "fetched collections"
        );
        Ok(all)
    }
}
