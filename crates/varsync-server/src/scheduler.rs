//! Background job scheduler.
//!
//! Registers the recurring processing pass that re-queues `pending` and
//! `error` records with auto-processing enabled.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use varsync_db::CatalogStore;
use varsync_sync::{process_pending, DetectionAudit, ProcessingReport};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler<D>(
    store: Arc<D>,
    config: Arc<varsync_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError>
where
    D: CatalogStore + 'static,
{
    let scheduler = JobScheduler::new().await?;
    register_processing_job(&scheduler, store, &config).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the processing pass on `config.processing_cron`
/// (default every six hours, `0 0 */6 * * *`).
async fn register_processing_job<D>(
    scheduler: &JobScheduler,
    store: Arc<D>,
    config: &varsync_core::AppConfig,
) -> Result<(), JobSchedulerError>
where
    D: CatalogStore + 'static,
{
    let running = Arc::new(Mutex::new(()));
    let max_concurrent = config.sync_max_concurrent_records;
    tracing::info!(cron = %config.processing_cron, "scheduler: registering processing job");

    let job = Job::new_async(config.processing_cron.as_str(), move |_uuid, _lock| {
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);

        Box::pin(async move {
            run_processing_tick(store.as_ref(), &running, max_concurrent).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// One scheduled tick. A tick that fires while the previous pass is still
/// running is skipped.
async fn run_processing_tick<D: CatalogStore>(
    store: &D,
    running: &Mutex<()>,
    max_concurrent: usize,
) -> Option<ProcessingReport> {
    let Ok(_guard) = running.try_lock() else {
        tracing::warn!("scheduler: previous processing pass still running; skipping tick");
        return None;
    };

    tracing::info!("scheduler: starting processing pass");
    match process_pending(store, &DetectionAudit, max_concurrent).await {
        Ok(report) => {
            tracing::info!(
                selected = report.selected,
                completed = report.completed,
                failed = report.failed,
                skipped = report.skipped,
                "scheduler: processing pass complete"
            );
            Some(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: processing pass failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use varsync_core::{ExistingRecordPolicy, ProcessingState, ProductFields, UpsertRequest};
    use varsync_db::MemoryCatalogStore;

    use super::*;

    async fn seeded_store() -> MemoryCatalogStore {
        let store = MemoryCatalogStore::new();
        store
            .upsert(UpsertRequest {
                external_id: "1".to_owned(),
                fields: ProductFields {
                    title: "Linen Shirt".to_owned(),
                    handle: "linen-shirt".to_owned(),
                    ..ProductFields::default()
                },
                detections: Vec::new(),
                force: false,
                policy: ExistingRecordPolicy::Skip,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn tick_processes_pending_records() {
        let store = seeded_store().await;
        let running = Mutex::new(());

        let report = run_processing_tick(&store, &running, 2).await.unwrap();

        assert_eq!(report.completed, 1);
        let record = store.get("1").await.unwrap().unwrap();
        assert_eq!(record.processing_status.state, ProcessingState::Completed);
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let store = seeded_store().await;
        let running = Mutex::new(());
        let _held = running.lock().await;

        assert!(run_processing_tick(&store, &running, 2).await.is_none());
        let record = store.get("1").await.unwrap().unwrap();
        assert_eq!(record.processing_status.state, ProcessingState::Pending);
    }
}
