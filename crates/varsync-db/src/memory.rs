//! In-process `CatalogStore`, used by tests and `VARSYNC_STORE=memory`.
//!
//! A single `RwLock` guards the records and their secondary indexes, so every
//! write (including the processing claim) is atomic per call.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tokio::sync::RwLock;
use varsync_core::{apply_upsert, CatalogRecord, CoreError, ProcessingState, UpsertRequest};

use crate::store::{
    CatalogStats, CatalogStore, Pagination, ProductCounts, ProductFilter, ProductPage,
    UpsertOutcome,
};
use crate::DbError;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, CatalogRecord>,
    by_state: HashMap<ProcessingState, BTreeSet<String>>,
    by_collection: HashMap<String, BTreeSet<String>>,
    display_enabled: BTreeSet<String>,
}

impl Inner {
    fn unindex(&mut self, record: &CatalogRecord) {
        let id = &record.external_id;
        if let Some(ids) = self.by_state.get_mut(&record.processing_status.state) {
            ids.remove(id);
        }
        for c in &record.collections {
            if let Some(ids) = self.by_collection.get_mut(&c.id) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_collection.remove(&c.id);
                }
            }
        }
        self.display_enabled.remove(id);
    }

    fn index(&mut self, record: &CatalogRecord) {
        let id = record.external_id.clone();
        self.by_state
            .entry(record.processing_status.state)
            .or_default()
            .insert(id.clone());
        for c in &record.collections {
            self.by_collection
                .entry(c.id.clone())
                .or_default()
                .insert(id.clone());
        }
        if record.display_settings.enabled {
            self.display_enabled.insert(id);
        }
    }

    fn put(&mut self, record: CatalogRecord) {
        if let Some(previous) = self.records.remove(&record.external_id) {
            self.unindex(&previous);
        }
        self.index(&record);
        self.records.insert(record.external_id.clone(), record);
    }

    fn ids_in_state(&self, state: ProcessingState) -> impl Iterator<Item = &String> {
        self.by_state.get(&state).into_iter().flatten()
    }

    fn candidates<'a>(&'a self, filter: &ProductFilter) -> Vec<&'a CatalogRecord> {
        // Narrow with the most selective index available, then apply the full filter.
        let narrowed: Box<dyn Iterator<Item = &'a CatalogRecord> + 'a> =
            if let Some(collection_id) = filter.collection_id.as_deref() {
                Box::new(
                    self.by_collection
                        .get(collection_id)
                        .into_iter()
                        .flatten()
                        .filter_map(|id| self.records.get(id)),
                )
            } else if let Some(state) = filter.state {
                Box::new(
                    self.ids_in_state(state)
                        .filter_map(|id| self.records.get(id)),
                )
            } else {
                Box::new(self.records.values())
            };
        narrowed.filter(|r| filter.matches(r)).collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    inner: RwLock<Inner>,
}

impl MemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CatalogStore for MemoryCatalogStore {
    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertOutcome, DbError> {
        let mut inner = self.inner.write().await;
        let existing = inner.records.get(&request.external_id).cloned();
        let (record, action) = apply_upsert(existing, request, Utc::now())?;
        if action.writes() {
            record.validate()?;
            inner.put(record.clone());
        }
        Ok(UpsertOutcome { record, action })
    }

    async fn get(&self, external_id: &str) -> Result<Option<CatalogRecord>, DbError> {
        Ok(self.inner.read().await.records.get(external_id).cloned())
    }

    async fn update<F>(&self, external_id: &str, apply: F) -> Result<CatalogRecord, DbError>
    where
        F: FnOnce(&mut CatalogRecord) -> Result<(), CoreError> + Send,
    {
        let mut inner = self.inner.write().await;
        let before = inner
            .records
            .get(external_id)
            .cloned()
            .ok_or_else(|| DbError::NotFound {
                external_id: external_id.to_owned(),
            })?;

        let mut record = before.clone();
        apply(&mut record)?;
        record.validate()?;
        record.finish_write(Some(&before), Utc::now());
        inner.put(record.clone());
        Ok(record)
    }

    async fn list_pending_processing(&self) -> Result<Vec<CatalogRecord>, DbError> {
        let inner = self.inner.read().await;
        let mut records: Vec<CatalogRecord> = inner
            .ids_in_state(ProcessingState::Pending)
            .chain(inner.ids_in_state(ProcessingState::Error))
            .filter_map(|id| inner.records.get(id))
            .filter(|r| r.processing_status.auto_process_enabled)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.processing_status
                .last_processed
                .cmp(&b.processing_status.last_processed)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        Ok(records)
    }

    async fn begin_processing(&self, external_id: &str) -> Result<Option<CatalogRecord>, DbError> {
        let mut inner = self.inner.write().await;
        let Some(before) = inner.records.get(external_id).cloned() else {
            return Ok(None);
        };
        if !before.processing_status.state.is_schedulable()
            || !before.processing_status.auto_process_enabled
        {
            return Ok(None);
        }

        let now = Utc::now();
        let mut record = before.clone();
        record.transition(ProcessingState::Processing, None, now)?;
        record.finish_write(Some(&before), now);
        inner.put(record.clone());
        Ok(Some(record))
    }

    async fn stats(&self) -> Result<CatalogStats, DbError> {
        let inner = self.inner.read().await;
        let state_count = |s: ProcessingState| inner.by_state.get(&s).map_or(0, |ids| ids.len() as u64);

        let mut variant_types = std::collections::BTreeMap::new();
        for d in inner
            .records
            .values()
            .flat_map(|r| &r.detected_variant_types)
        {
            *variant_types.entry(d.variant_type).or_insert(0) += 1;
        }

        Ok(CatalogStats {
            products: ProductCounts {
                total: inner.records.len() as u64,
                active: inner.display_enabled.len() as u64,
                pending: state_count(ProcessingState::Pending),
                completed: state_count(ProcessingState::Completed),
                errors: state_count(ProcessingState::Error),
            },
            variant_types,
            last_updated: Utc::now(),
        })
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: u32,
        page_size: u32,
    ) -> Result<ProductPage, DbError> {
        let inner = self.inner.read().await;
        let mut matched = inner.candidates(filter);
        matched.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });

        let pagination = Pagination::new(page, page_size, matched.len() as u64);
        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        let records = matched
            .into_iter()
            .skip(offset)
            .take(pagination.page_size as usize)
            .cloned()
            .collect();

        Ok(ProductPage {
            records,
            pagination,
        })
    }

    async fn count_by_collection(&self) -> Result<HashMap<String, u64>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_collection
            .iter()
            .map(|(id, members)| (id.clone(), members.len() as u64))
            .collect())
    }

    async fn list_display_enabled(&self) -> Result<Vec<CatalogRecord>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner
            .display_enabled
            .iter()
            .filter_map(|id| inner.records.get(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
