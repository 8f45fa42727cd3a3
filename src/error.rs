use alloy::transports::TransportError;
use thiserror::Error;

/// Failure taxonomy for the sync engine.
///
/// `ChainUnavailable` aborts the running cycle and leaves the checkpoint
/// untouched. `StoreUnavailable` is per-record during persistence and only
/// fatal when the checkpoint itself cannot be read or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("a sync cycle is already in progress")]
    CycleInProgress,
}

impl SyncError {
    pub fn is_chain(&self) -> bool {
        matches!(self, SyncError::ChainUnavailable(_))
    }
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        SyncError::ChainUnavailable(e.to_string())
    }
}

impl From<tokio_postgres::Error> for SyncError {
    fn from(e: tokio_postgres::Error) -> Self {
        SyncError::StoreUnavailable(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for SyncError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        SyncError::StoreUnavailable(e.to_string())
    }
}
