//! One pass of the processing queue.
//!
//! Each schedulable record (`pending` or `error`, auto-processing on) is
//! claimed with a compare-and-set, run through a [`ProcessingStep`], and moved
//! to `completed` or `error`. A record that another worker already claimed is
//! skipped. One record's failure never stops the pass.

use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use varsync_core::CatalogRecord;
use varsync_db::CatalogStore;

use crate::error::SyncError;

/// Failure reported by a [`ProcessingStep`]; stored as the record's error
/// message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StepError(pub String);

/// Finalisation work run on a claimed record.
pub trait ProcessingStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, record: &CatalogRecord) -> impl Future<Output = Result<(), StepError>> + Send;
}

/// Checks that every detected type carries at least one value and a
/// confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionAudit;

impl ProcessingStep for DetectionAudit {
    fn name(&self) -> &'static str {
        "detection_audit"
    }

    async fn run(&self, record: &CatalogRecord) -> Result<(), StepError> {
        for detection in &record.detected_variant_types {
            if detection.values.is_empty() {
                return Err(StepError(format!(
                    "detected {} option \"{}\" has no values",
                    detection.variant_type, detection.name
                )));
            }
            if !(0.0..=1.0).contains(&detection.confidence) {
                return Err(StepError(format!(
                    "detected {} option \"{}\" has confidence {} outside [0, 1]",
                    detection.variant_type, detection.name, detection.confidence
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingReport {
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Completed,
    Failed,
    Skipped,
}

impl ProcessingReport {
    fn record(mut self, outcome: RecordOutcome) -> Self {
        match outcome {
            RecordOutcome::Completed => self.completed += 1,
            RecordOutcome::Failed => self.failed += 1,
            RecordOutcome::Skipped => self.skipped += 1,
        }
        self
    }
}

/// Runs one pass over every schedulable record.
///
/// # Errors
///
/// Returns [`SyncError::Store`] only when the candidate list cannot be read.
/// Per-record failures are counted in the report.
pub async fn process_pending<D, P>(
    store: &D,
    step: &P,
    max_concurrent: usize,
) -> Result<ProcessingReport, SyncError>
where
    D: CatalogStore,
    P: ProcessingStep,
{
    let candidates = store.list_pending_processing().await?;
    let selected = candidates.len();
    tracing::info!(selected, step = step.name(), "processing pass started");

    let report = stream::iter(candidates)
        .map(|record| process_one(store, step, record.external_id))
        .buffer_unordered(max_concurrent.max(1))
        .fold(
            ProcessingReport {
                selected,
                ..ProcessingReport::default()
            },
            |report, outcome| async move { report.record(outcome) },
        )
        .await;

    tracing::info!(
        selected = report.selected,
        completed = report.completed,
        failed = report.failed,
        skipped = report.skipped,
        "processing pass finished"
    );
    Ok(report)
}

async fn process_one<D, P>(store: &D, step: &P, external_id: String) -> RecordOutcome
where
    D: CatalogStore,
    P: ProcessingStep,
{
    let record = match store.begin_processing(&external_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::debug!(%external_id, "record already claimed or no longer schedulable");
            return RecordOutcome::Skipped;
        }
        Err(e) => {
            tracing::warn!(%external_id, error = %e, "failed to claim record");
            return RecordOutcome::Failed;
        }
    };

    match step.run(&record).await {
        Ok(()) => match store.complete_processing(&external_id).await {
            Ok(_) => RecordOutcome::Completed,
            Err(e) => {
                tracing::warn!(%external_id, error = %e, "failed to mark record completed");
                fail_best_effort(store, &external_id, format!("{e}")).await;
                RecordOutcome::Failed
            }
        },
        Err(e) => {
            tracing::warn!(%external_id, step = step.name(), error = %e, "processing step failed");
            fail_best_effort(store, &external_id, e.0).await;
            RecordOutcome::Failed
        }
    }
}

async fn fail_best_effort<D: CatalogStore>(store: &D, external_id: &str, message: String) {
    if let Err(e) = store.fail_processing(external_id, message).await {
        tracing::error!(%external_id, error = %e, "failed to mark record as errored");
    }
}
