//! Pull sync from a remote catalog into the catalog store.
//!
//! Pages are fetched one at a time. Records inside a page are transformed,
//! classified, and upserted concurrently, and each record's result folds into
//! a per-page tally that the run absorbs before deciding whether to continue.
//! A record that fails is counted and logged; it never ends the run. A page
//! fetch that fails or times out ends the run with the counters gathered so
//! far.
//!
//! Every run is bounded by `max_pages`, and a cursor the source has already
//! handed out ends the run, so a remote that loops or serves endless empty
//! pages cannot keep it alive.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use varsync_core::classifier::DEFAULT_CONFIDENCE;
use varsync_core::{
    index_options, AppConfig, CatalogSource, DetectedVariantType, ExistingRecordPolicy, Page,
    UpsertAction, UpsertRequest, MAX_BACKOFF_SECS,
};
use varsync_db::CatalogStore;

/// Default for [`SyncOptions::max_pages`].
pub const DEFAULT_MAX_PAGES: usize = 200;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub page_size: u32,
    /// Safety cap on synced records in full-catalog mode.
    pub max_records: usize,
    /// Safety cap on fetched pages, in both modes.
    pub max_pages: usize,
    pub max_concurrent: usize,
    /// Flat confidence stamped on every detection this run writes.
    pub detection_confidence: f64,
    pub policy: ExistingRecordPolicy,
    pub fetch_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_records: 500,
            max_pages: DEFAULT_MAX_PAGES,
            max_concurrent: 4,
            detection_confidence: DEFAULT_CONFIDENCE,
            policy: ExistingRecordPolicy::Skip,
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

impl SyncOptions {
    /// Derives sync options from the application config.
    ///
    /// The page-fetch timeout covers every attempt the HTTP client may make
    /// plus the longest back-off between them.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let retries = u64::from(config.http_max_retries);
        let fetch_timeout_secs = config
            .http_timeout_secs
            .saturating_mul(retries + 1)
            .saturating_add(MAX_BACKOFF_SECS.saturating_mul(retries));
        Self {
            page_size: config.sync_page_size,
            max_records: config.sync_max_records,
            max_pages: config.sync_max_pages,
            max_concurrent: config.sync_max_concurrent_records,
            detection_confidence: config.sync_detection_confidence,
            policy: config.sync_existing_policy,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        }
    }
}

/// Why a sync run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source reported no further pages.
    #[default]
    Exhausted,
    /// `max_records` was reached (full-catalog mode only).
    CapReached,
    /// `max_pages` pages were fetched.
    PageLimit,
    /// The source handed out a cursor it had already returned.
    CursorRepeated,
    FetchFailed,
    TimedOut,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Exhausted => "exhausted",
            StopReason::CapReached => "cap_reached",
            StopReason::PageLimit => "page_limit",
            StopReason::CursorRepeated => "cursor_repeated",
            StopReason::FetchFailed => "fetch_failed",
            StopReason::TimedOut => "timed_out",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Counters for one page of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
    pub synced: usize,
    pub errors: usize,
    /// Records created by this page (also counted in `synced`).
    pub created: usize,
}

impl PageTally {
    fn record(mut self, result: Option<UpsertAction>) -> Self {
        match result {
            Some(action) => {
                self.synced += 1;
                if action == UpsertAction::Created {
                    self.created += 1;
                }
            }
            None => self.errors += 1,
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced_count: usize,
    pub error_count: usize,
    pub created_count: usize,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
}

impl SyncReport {
    fn absorb(&mut self, tally: PageTally) {
        self.pages_fetched += 1;
        self.synced_count += tally.synced;
        self.error_count += tally.errors;
        self.created_count += tally.created;
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    Catalog,
    Collection(&'a str),
}

/// Syncs the whole remote catalog, stopping at `options.max_records`.
pub async fn sync_catalog<S, D>(
    source: &S,
    store: &D,
    options: &SyncOptions,
    force: bool,
    cancel: &CancellationToken,
) -> SyncReport
where
    S: CatalogSource,
    D: CatalogStore,
{
    run(source, store, Scope::Catalog, options, force, cancel).await
}

/// Syncs one collection's products. The record cap does not apply.
pub async fn sync_collection<S, D>(
    source: &S,
    store: &D,
    collection_id: &str,
    options: &SyncOptions,
    force: bool,
    cancel: &CancellationToken,
) -> SyncReport
where
    S: CatalogSource,
    D: CatalogStore,
{
    run(
        source,
        store,
        Scope::Collection(collection_id),
        options,
        force,
        cancel,
    )
    .await
}

/// Full-catalog sync when `collection_id` is `None`, collection sync otherwise.
pub async fn sync<S, D>(
    source: &S,
    store: &D,
    collection_id: Option<&str>,
    options: &SyncOptions,
    force: bool,
    cancel: &CancellationToken,
) -> SyncReport
where
    S: CatalogSource,
    D: CatalogStore,
{
    match collection_id {
        Some(id) => sync_collection(source, store, id, options, force, cancel).await,
        None => sync_catalog(source, store, options, force, cancel).await,
    }
}

async fn run<S, D>(
    source: &S,
    store: &D,
    scope: Scope<'_>,
    options: &SyncOptions,
    force: bool,
    cancel: &CancellationToken,
) -> SyncReport
where
    S: CatalogSource,
    D: CatalogStore,
{
    let mut report = SyncReport::default();
    let mut cursor: Option<String> = None;
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let max_concurrent = options.max_concurrent.max(1);

    tracing::info!(?scope, force, page_size = options.page_size, "starting catalog sync");

    loop {
        if cancel.is_cancelled() {
            report.stop_reason = StopReason::Cancelled;
            break;
        }

        let fetched = tokio::time::timeout(
            options.fetch_timeout,
            fetch_page(source, scope, cursor.as_deref(), options.page_size),
        )
        .await;

        let page = match fetched {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                tracing::error!(cursor = ?cursor, error = %e, "page fetch failed; ending sync");
                report.error_count += 1;
                report.stop_reason = StopReason::FetchFailed;
                break;
            }
            Err(_) => {
                tracing::error!(
                    cursor = ?cursor,
                    timeout = ?options.fetch_timeout,
                    "page fetch timed out; ending sync"
                );
                report.error_count += 1;
                report.stop_reason = StopReason::TimedOut;
                break;
            }
        };

        let next_cursor = page.next_cursor().map(str::to_owned);

        let tally = stream::iter(page.records)
            .map(|raw| sync_record(source, store, raw, options, force))
            .buffer_unordered(max_concurrent)
            .fold(PageTally::default(), |tally, result| async move {
                tally.record(result)
            })
            .await;

        report.absorb(tally);
        tracing::debug!(
            page = report.pages_fetched,
            synced = tally.synced,
            errors = tally.errors,
            "page synced"
        );

        if matches!(scope, Scope::Catalog) && report.synced_count >= options.max_records {
            report.stop_reason = StopReason::CapReached;
            break;
        }

        let Some(next) = next_cursor else {
            break;
        };
        if !seen_cursors.insert(next.clone()) {
            tracing::warn!(cursor = %next, "source repeated a cursor; ending sync");
            report.stop_reason = StopReason::CursorRepeated;
            break;
        }
        if report.pages_fetched >= options.max_pages {
            tracing::warn!(
                max_pages = options.max_pages,
                "page limit reached with more pages remaining; ending sync"
            );
            report.stop_reason = StopReason::PageLimit;
            break;
        }
        cursor = Some(next);
    }

    tracing::info!(
        synced = report.synced_count,
        errors = report.error_count,
        created = report.created_count,
        pages = report.pages_fetched,
        stop_reason = %report.stop_reason,
        "catalog sync finished"
    );
    report
}

async fn fetch_page<S: CatalogSource>(
    source: &S,
    scope: Scope<'_>,
    cursor: Option<&str>,
    page_size: u32,
) -> Result<Page<S::Record>, S::Error> {
    match scope {
        Scope::Catalog => source.fetch_product_page(cursor, page_size).await,
        Scope::Collection(id) => {
            source
                .fetch_collection_product_page(id, cursor, page_size)
                .await
        }
    }
}

/// Transforms, classifies, and upserts one record. `None` means it failed
/// and has been logged.
async fn sync_record<S, D>(
    source: &S,
    store: &D,
    raw: S::Record,
    options: &SyncOptions,
    force: bool,
) -> Option<UpsertAction>
where
    S: CatalogSource,
    D: CatalogStore,
{
    let product = match source.transform(raw) {
        Ok(product) => product,
        Err(e) => {
            tracing::warn!(error = %e, "skipping record that failed to transform");
            return None;
        }
    };

    let detections = DetectedVariantType::from_options(
        &index_options(&product.variants),
        options.detection_confidence,
    );
    let external_id = product.external_id;

    let request = UpsertRequest {
        external_id: external_id.clone(),
        fields: product.fields,
        detections,
        force,
        policy: options.policy,
    };

    match store.upsert(request).await {
        Ok(outcome) => {
            tracing::debug!(%external_id, action = ?outcome.action, "record synced");
            Some(outcome.action)
        }
        Err(e) => {
            tracing::warn!(%external_id, error = %e, "record upsert failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
