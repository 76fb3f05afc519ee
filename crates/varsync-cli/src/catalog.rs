//! Read-only catalog queries: `stats` and `list`.

use varsync_core::ProcessingState;
use varsync_db::{CatalogStore, ProductFilter};

const TITLE_WIDTH: usize = 40;

/// Builds a listing filter from raw CLI arguments.
///
/// # Errors
///
/// Returns an error if `status` is not a known processing state.
pub(crate) fn build_filter(
    status: Option<&str>,
    collection: Option<String>,
    search: Option<String>,
) -> anyhow::Result<ProductFilter> {
    let state = status.map(str::parse::<ProcessingState>).transpose()?;
    Ok(ProductFilter {
        state,
        collection_id: collection.filter(|c| !c.trim().is_empty()),
        search_text: search,
    })
}

/// Prints product counts and per-type detection counts.
///
/// # Errors
///
/// Returns an error if the store query fails or JSON encoding fails.
pub(crate) async fn run_stats<D: CatalogStore>(store: &D, json: bool) -> anyhow::Result<()> {
    let stats = store.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let p = &stats.products;
    println!("products   {:>6}", p.total);
    println!("active     {:>6}", p.active);
    println!("pending    {:>6}", p.pending);
    println!("completed  {:>6}", p.completed);
    println!("errors     {:>6}", p.errors);
    if !stats.variant_types.is_empty() {
        println!();
        println!("{:<11}{:>6}", "TYPE", "COUNT");
        for (variant_type, count) in &stats.variant_types {
            println!("{:<11}{count:>6}", variant_type.to_string());
        }
    }
    println!();
    println!("as of {}", stats.last_updated.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

/// Prints one page of stored products, most recently updated first.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub(crate) async fn run_list<D: CatalogStore>(
    store: &D,
    filter: &ProductFilter,
    page: u32,
    page_size: u32,
) -> anyhow::Result<()> {
    let result = store.list_products(filter, page, page_size).await?;

    if result.records.is_empty() {
        println!("no products found; run `sync` first");
        return Ok(());
    }

    println!(
        "{:<16}{:<12}{:<8}{:<20}TITLE",
        "ID", "STATUS", "TYPES", "UPDATED"
    );
    for record in &result.records {
        println!(
            "{:<16}{:<12}{:<8}{:<20}{}",
            record.external_id,
            record.processing_status.state.to_string(),
            record.detected_variant_types.len(),
            record.updated_at.format("%Y-%m-%d %H:%M"),
            truncate(&record.title, TITLE_WIDTH)
        );
    }

    let pg = result.pagination;
    println!();
    println!(
        "page {} of {} ({} products)",
        pg.page,
        pg.total_pages.max(1),
        pg.total
    );
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_status() {
        let filter = build_filter(Some("error"), None, None).unwrap();
        assert_eq!(filter.state, Some(ProcessingState::Error));
    }

    #[test]
    fn filter_rejects_unknown_status() {
        assert!(build_filter(Some("archived"), None, None).is_err());
    }

    #[test]
    fn blank_collection_is_no_filter() {
        let filter = build_filter(None, Some("  ".to_owned()), Some("linen".to_owned())).unwrap();
        assert!(filter.collection_id.is_none());
        assert_eq!(filter.search(), Some("linen"));
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Café Noir", 4), "Café...");
        assert_eq!(truncate("short", 10), "short");
    }
}
