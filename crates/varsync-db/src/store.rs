//! The `CatalogStore` seam shared by the Postgres and in-memory backends.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use varsync_core::{
    CatalogRecord, CoreError, CustomIcon, DetectedVariantType, DisplayPosition, DisplaySettings,
    ProcessingState, UpsertAction, UpsertRequest, VariantType,
};

use crate::DbError;

/// Upper bound for `page_size` in [`CatalogStore::list_products`].
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub record: CatalogRecord,
    pub action: UpsertAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductCounts {
    pub total: u64,
    /// Records with display enabled.
    pub active: u64,
    pub pending: u64,
    pub completed: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub products: ProductCounts,
    /// One count per detected type across all records, regardless of name.
    pub variant_types: BTreeMap<VariantType, u64>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub state: Option<ProcessingState>,
    pub collection_id: Option<String>,
    pub search_text: Option<String>,
}

impl ProductFilter {
    /// Search text with surrounding whitespace removed; blank counts as absent.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        self.state
            .is_none_or(|s| record.processing_status.state == s)
            && self
                .collection_id
                .as_deref()
                .is_none_or(|id| record.in_collection(id))
            && self.search().is_none_or(|q| record.matches_search(q))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Normalises a request: 1-based page (0 becomes 1), size clamped to
    /// `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn clamp(page: u32, page_size: u32) -> (u32, u32) {
        (page.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
    }

    #[must_use]
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let (page, page_size) = Self::clamp(page, page_size);
        Self {
            page,
            page_size,
            total,
            total_pages: total.div_ceil(u64::from(page_size)),
        }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub records: Vec<CatalogRecord>,
    pub pagination: Pagination,
}

/// Durable storage for catalog records.
///
/// Every write validates the resulting record and applies
/// [`CatalogRecord::finish_write`] before persisting; a rejected write leaves
/// the stored record as it was.
pub trait CatalogStore: Send + Sync {
    /// Applies the upsert contract for one remote record.
    fn upsert(
        &self,
        request: UpsertRequest,
    ) -> impl Future<Output = Result<UpsertOutcome, DbError>> + Send;

    fn get(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<CatalogRecord>, DbError>> + Send;

    /// Read-modify-write on one record under the store's per-record lock.
    fn update<F>(
        &self,
        external_id: &str,
        apply: F,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send
    where
        F: FnOnce(&mut CatalogRecord) -> Result<(), CoreError> + Send;

    /// Records in `pending` or `error` with auto-processing on, oldest
    /// `last_processed` first.
    fn list_pending_processing(
        &self,
    ) -> impl Future<Output = Result<Vec<CatalogRecord>, DbError>> + Send;

    /// Compare-and-set claim: moves a schedulable record to `processing`.
    /// Returns `None` when the record is missing, already claimed, or has
    /// auto-processing off.
    fn begin_processing(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<CatalogRecord>, DbError>> + Send;

    fn stats(&self) -> impl Future<Output = Result<CatalogStats, DbError>> + Send;

    /// Filtered listing, most recently updated first.
    fn list_products(
        &self,
        filter: &ProductFilter,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<ProductPage, DbError>> + Send;

    /// Collection id -> number of stored records that belong to it.
    fn count_by_collection(
        &self,
    ) -> impl Future<Output = Result<HashMap<String, u64>, DbError>> + Send;

    fn list_display_enabled(
        &self,
    ) -> impl Future<Output = Result<Vec<CatalogRecord>, DbError>> + Send;

    fn complete_processing(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, |record| {
            record.transition(ProcessingState::Completed, None, Utc::now())
        })
    }

    fn fail_processing(
        &self,
        external_id: &str,
        message: String,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, move |record| {
            record.transition(ProcessingState::Error, Some(message), Utc::now())
        })
    }

    fn update_display_settings(
        &self,
        external_id: &str,
        settings: DisplaySettings,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, move |record| {
            record.set_display_settings(settings)
        })
    }

    fn enable_display(
        &self,
        external_id: &str,
        position: DisplayPosition,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, move |record| {
            record.enable_display(position);
            Ok(())
        })
    }

    fn add_custom_icon(
        &self,
        external_id: &str,
        icon: CustomIcon,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, move |record| record.add_custom_icon(icon))
    }

    fn add_detected_variant_type(
        &self,
        external_id: &str,
        detection: DetectedVariantType,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, move |record| {
            record.add_detected_variant_type(detection)
        })
    }

    fn set_auto_process(
        &self,
        external_id: &str,
        enabled: bool,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, move |record| {
            record.processing_status.auto_process_enabled = enabled;
            Ok(())
        })
    }

    fn set_variant_detection(
        &self,
        external_id: &str,
        enabled: bool,
    ) -> impl Future<Output = Result<CatalogRecord, DbError>> + Send {
        self.update(external_id, move |record| {
            record.variant_detection_enabled = enabled;
            Ok(())
        })
    }
}
