mod catalog;
mod remote;
mod variants;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use varsync_core::{AppConfig, StoreBackend};
use varsync_db::{CatalogStore, MemoryCatalogStore, PgCatalogStore};

#[derive(Debug, Parser)]
#[command(name = "varsync-cli")]
#[command(about = "Variant detection and catalog sync for a Shopify store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pull products from Shopify, classify their options, and store them
    Sync {
        /// Sync a single collection instead of the full catalog
        #[arg(long)]
        collection: Option<String>,
        /// Reclassify and refresh records that already exist
        #[arg(long)]
        force: bool,
    },
    /// Show catalog and detection statistics
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List stored products, most recently updated first
    List {
        /// Filter by processing state (pending, processing, completed, error)
        #[arg(long)]
        status: Option<String>,
        /// Filter by collection id
        #[arg(long)]
        collection: Option<String>,
        /// Case-insensitive search over title, handle, and vendor
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
    },
    /// List Shopify collections with the number of stored products in each
    Collections,
    /// Run one processing pass over pending and errored records
    Process,
    /// Resolve a selection to a single variant
    Resolve {
        /// Product id (numeric or `gid://shopify/Product/...`)
        product: String,
        /// Selected option as `Name=Value`; repeat for each option
        #[arg(long = "select", value_parser = parse_selection)]
        selections: Vec<(String, String)>,
        /// Read variants from a JSON file instead of Shopify
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show a product's option dimensions as the storefront widget renders them
    Options {
        /// Product id (numeric or `gid://shopify/Product/...`)
        product: String,
        /// Read variants from a JSON file instead of Shopify
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Apply pending database migrations
    Migrate,
}

fn parse_selection(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected Name=Value, got \"{raw}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("option name is empty in \"{raw}\""));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = varsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Variant commands never touch the store.
    match cli.command {
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
        Some(Commands::Resolve {
            product,
            selections,
            file,
        }) => variants::run_resolve(&config, &product, &selections, file.as_deref()).await,
        Some(Commands::Options { product, file }) => {
            variants::run_options(&config, &product, file.as_deref()).await
        }
        Some(Commands::Migrate) => run_migrate(&config).await,
        Some(command) => run_with_store(&config, command).await,
    }
}

async fn run_migrate(config: &AppConfig) -> anyhow::Result<()> {
    if config.store_backend != StoreBackend::Postgres {
        anyhow::bail!("migrate requires VARSYNC_STORE=postgres");
    }
    let pool = varsync_db::connect_pool_from_config(config).await?;
    let applied = varsync_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

async fn run_with_store(config: &AppConfig, command: Commands) -> anyhow::Result<()> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = varsync_db::connect_pool_from_config(config).await?;
            dispatch(&PgCatalogStore::new(pool), config, command).await
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; nothing persists past this command");
            dispatch(&MemoryCatalogStore::new(), config, command).await
        }
    }
}

async fn dispatch<D: CatalogStore>(
    store: &D,
    config: &AppConfig,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Sync { collection, force } => {
            remote::run_sync(store, config, collection.as_deref(), force).await
        }
        Commands::Stats { json } => catalog::run_stats(store, json).await,
        Commands::List {
            status,
            collection,
            search,
            page,
            page_size,
        } => {
            let filter = catalog::build_filter(status.as_deref(), collection, search)?;
            catalog::run_list(store, &filter, page, page_size).await
        }
        Commands::Collections => remote::run_collections(store, config).await,
        Commands::Process => remote::run_process(store, config).await,
        Commands::Resolve { .. } | Commands::Options { .. } | Commands::Migrate => {
            anyhow::bail!("command does not read the catalog store")
        }
    }
}

#[cfg(test)]
mod tests;
