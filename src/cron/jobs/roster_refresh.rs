//! Job to refresh operator metadata from the roster service.

use anyhow::Result;
use log::info;

use crate::{db::OperatorStore, worker::RosterClient};

pub async fn run<S: OperatorStore>(roster: &RosterClient, store: &S) -> Result<()> {
    info!("Starting roster_refresh job...");

    let start = std::time::Instant::now();
    let report = roster.refresh_roster(store).await?;

    info!(
        "Completed roster_refresh job in {:?} ({} operators, {} failed)",
        start.elapsed(),
        report.total,
        report.store_errors
    );
    Ok(())
}
