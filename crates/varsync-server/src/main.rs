mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use varsync_core::{AppConfig, StoreBackend};
use varsync_db::{CatalogStore, MemoryCatalogStore, PgCatalogStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(varsync_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, store = ?config.store_backend, "starting varsync-server");

    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = varsync_db::connect_pool_from_config(&config).await?;
            varsync_db::run_migrations(&pool).await?;
            run(Arc::new(PgCatalogStore::new(pool)), config).await
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; records are lost on shutdown");
            run(Arc::new(MemoryCatalogStore::new()), config).await
        }
    }
}

async fn run<D>(store: Arc<D>, config: Arc<AppConfig>) -> anyhow::Result<()>
where
    D: CatalogStore + 'static,
{
    let mut scheduler = scheduler::build_scheduler(store, config).await?;

    shutdown_signal().await;

    scheduler.shutdown().await?;
    tracing::info!("scheduler stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping scheduler");
}
