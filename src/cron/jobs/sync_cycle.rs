//! Job that runs one chain sync cycle.
//!
//! A tick that lands while the previous cycle is still running is skipped;
//! the next tick picks up from whatever checkpoint that cycle leaves behind.

use anyhow::Result;
use log::info;

use crate::{
    db::{CheckpointStore, LogStore, OperatorStore},
    error::SyncError,
    rpc::ChainSource,
    worker::SyncOrchestrator,
};

pub async fn run<C, S>(orchestrator: &SyncOrchestrator<C, S>) -> Result<()>
where
    C: ChainSource,
    S: LogStore + CheckpointStore + OperatorStore,
{
    match orchestrator.run_cycle().await {
        Ok(_) => Ok(()),
        Err(SyncError::CycleInProgress) => {
            info!("[SYNC] Previous cycle still running, skipping this tick");
            Ok(())
        },
        Err(e) if e.is_chain() => Err(anyhow::Error::new(e).context("Chain unavailable")),
        Err(e) => Err(anyhow::Error::new(e).context("Store unavailable")),
    }
}
