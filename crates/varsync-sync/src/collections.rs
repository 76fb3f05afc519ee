//! Remote collections joined with local record counts.

use std::time::Duration;

use serde::Serialize;
use varsync_core::{CatalogSource, SourceCollection};
use varsync_db::CatalogStore;

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    #[serde(flatten)]
    pub collection: SourceCollection,
    /// Stored records that list this collection.
    pub local_count: u64,
}

/// Lists every remote collection with the number of locally stored records
/// that belong to it.
///
/// # Errors
///
/// Returns [`SyncError::Timeout`] if the remote listing exceeds `timeout`,
/// [`SyncError::Source`] if it fails, or [`SyncError::Store`] if the local
/// counts cannot be read.
pub async fn collections_with_counts<S, D>(
    source: &S,
    store: &D,
    page_size: u32,
    timeout: Duration,
) -> Result<Vec<CollectionSummary>, SyncError>
where
    S: CatalogSource,
    D: CatalogStore,
{
    let collections = tokio::time::timeout(timeout, source.fetch_collections(page_size))
        .await
        .map_err(|_| SyncError::Timeout(timeout))?
        .map_err(SyncError::from_source)?;
    let counts = store.count_by_collection().await?;

    Ok(collections
        .into_iter()
        .map(|collection| CollectionSummary {
            local_count: counts.get(&collection.id).copied().unwrap_or(0),
            collection,
        })
        .collect())
}
