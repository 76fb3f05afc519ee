pub mod collections;
pub mod error;
pub mod orchestrator;
pub mod processing;

pub use collections::{collections_with_counts, CollectionSummary};
pub use error::SyncError;
pub use orchestrator::{
    sync, sync_catalog, sync_collection, PageTally, StopReason, SyncOptions, SyncReport,
    DEFAULT_MAX_PAGES,
};
pub use processing::{process_pending, DetectionAudit, ProcessingReport, ProcessingStep, StepError};
