use std::future::Future;

use crate::error::SyncError;

pub mod client;
pub mod governor;
pub mod types;

pub use client::ChainClient;
pub use governor::RateGovernor;
pub use types::RawLog;

/// Chain reads used by the sync orchestrator.
///
/// Implementations issue one external request per call and never split
/// ranges themselves; windowing belongs to the caller.
pub trait ChainSource: Send + Sync {
    fn current_height(&self) -> impl Future<Output = Result<u64, SyncError>> + Send;

    fn logs_in_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> impl Future<Output = Result<Vec<RawLog>, SyncError>> + Send;
}
