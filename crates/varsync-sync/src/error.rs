use std::time::Duration;

use thiserror::Error;
use varsync_db::DbError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote catalog error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error("remote catalog did not answer within {0:?}")]
    Timeout(Duration),
}

impl SyncError {
    pub(crate) fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Box::new(err))
    }
}
