//! Commands that talk to Shopify or drive processing: `sync`,
//! `collections`, and `process`.

use tokio_util::sync::CancellationToken;
use varsync_core::AppConfig;
use varsync_db::CatalogStore;
use varsync_shopify::{ShopifyClient, ShopifyClientConfig};
use varsync_sync::{DetectionAudit, StopReason, SyncOptions};

pub(crate) fn build_shopify_client(config: &AppConfig) -> anyhow::Result<ShopifyClient> {
    let client_config = ShopifyClientConfig::from_app_config(config)?;
    ShopifyClient::new(&client_config)
        .map_err(|e| anyhow::anyhow!("failed to build Shopify client: {e}"))
}

/// Runs one sync pass, full catalog or a single collection.
///
/// Ctrl-C stops the pass between pages; records already written stay
/// written.
///
/// # Errors
///
/// Returns an error if the Shopify client cannot be built. Remote and
/// per-record failures are counted in the printed report instead.
pub(crate) async fn run_sync<D: CatalogStore>(
    store: &D,
    config: &AppConfig,
    collection: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let client = build_shopify_client(config)?;
    let options = SyncOptions::from_app_config(config);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping after the current page");
                cancel.cancel();
            }
        }
    });

    tracing::info!(
        collection = collection.unwrap_or("all"),
        force,
        max_records = options.max_records,
        "starting sync"
    );
    let report = varsync_sync::sync(&client, store, collection, &options, force, &cancel).await;
    watcher.abort();

    println!(
        "synced {} products ({} new), {} errors, {} pages; stopped: {}",
        report.synced_count,
        report.created_count,
        report.error_count,
        report.pages_fetched,
        report.stop_reason
    );
    match report.stop_reason {
        StopReason::CapReached => eprintln!(
            "warning: record cap of {} reached; run again to continue",
            options.max_records
        ),
        StopReason::PageLimit => eprintln!(
            "warning: stopped after {} pages with more remaining (VARSYNC_SYNC_MAX_PAGES)",
            options.max_pages
        ),
        StopReason::CursorRepeated => {
            eprintln!("warning: Shopify returned a cursor it had already sent; sync ended early");
        }
        _ => {}
    }
    Ok(())
}

/// Lists remote collections with local record counts.
///
/// # Errors
///
/// Returns an error if the client cannot be built, the listing fails, or
/// the local counts cannot be read.
pub(crate) async fn run_collections<D: CatalogStore>(
    store: &D,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let client = build_shopify_client(config)?;
    let options = SyncOptions::from_app_config(config);
    let summaries = varsync_sync::collections_with_counts(
        &client,
        store,
        options.page_size,
        options.fetch_timeout,
    )
    .await?;

    if summaries.is_empty() {
        println!("no collections found");
        return Ok(());
    }

    println!("{:<16}{:>8}{:>8}  TITLE", "ID", "REMOTE", "LOCAL");
    for summary in &summaries {
        let remote = summary
            .collection
            .products_count
            .map_or_else(|| "-".to_owned(), |n| n.to_string());
        println!(
            "{:<16}{remote:>8}{:>8}  {}",
            summary.collection.id, summary.local_count, summary.collection.title
        );
    }
    Ok(())
}

/// Runs one processing pass over pending and errored records.
///
/// # Errors
///
/// Returns an error if the pending records cannot be listed.
pub(crate) async fn run_process<D: CatalogStore>(
    store: &D,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let report =
        varsync_sync::process_pending(store, &DetectionAudit, config.sync_max_concurrent_records)
            .await?;
    println!(
        "processed {} records: {} completed, {} failed, {} skipped",
        report.selected, report.completed, report.failed, report.skipped
    );
    Ok(())
}
