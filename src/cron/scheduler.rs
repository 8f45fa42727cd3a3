//! Cron scheduler for periodic background tasks.
//!
//! Runs jobs like:
//! - Running a chain sync cycle (height, logs, aggregates, checkpoint)
//! - Refreshing operator metadata from the roster service

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::{
    db::Database,
    rpc::ChainClient,
    worker::{RosterClient, SyncOrchestrator},
};

use super::jobs;

pub type Orchestrator = SyncOrchestrator<ChainClient, Database>;

/// Cron scheduler that manages periodic background jobs.
pub struct CronScheduler {
    orchestrator: Arc<Orchestrator>,
    roster: Option<Arc<RosterClient>>,
    settings: Arc<CronSettings>,
}

/// Configuration for cron job intervals
#[derive(Debug, Clone)]
pub struct CronSettings {
    /// Interval between sync cycles - default 1 minute
    pub sync_interval_secs: u64,
    /// Interval for refreshing the operator roster - default 30 minutes
    pub roster_interval_secs: u64,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            sync_interval_secs: 60,
            roster_interval_secs: 1_800,
        }
    }
}

impl CronScheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        roster: Option<Arc<RosterClient>>,
        settings: CronSettings,
    ) -> Self {
        Self {
            orchestrator,
            roster,
            settings: Arc::new(settings),
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        let mut job_count = 1;
        self.register_sync_cycle_job(&scheduler).await?;
        if let Some(roster) = &self.roster {
            self.register_roster_refresh_job(&scheduler, roster.clone())
                .await?;
            job_count += 1;
        }

        scheduler.start().await?;
        info!("Cron scheduler started with {} jobs", job_count);

        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_sync_cycle_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let orchestrator = self.orchestrator.clone();
        let interval = self.settings.sync_interval_secs;

        let job = Job::new_repeated_async(Duration::from_secs(interval), move |_uuid, _lock| {
            let orchestrator = orchestrator.clone();
            Box::pin(async move {
                if let Err(e) = jobs::sync_cycle::run(&orchestrator).await {
                    error!("Sync cycle failed: {:#}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        info!("Registered sync_cycle job (every {}s)", interval);
        Ok(())
    }

    async fn register_roster_refresh_job(
        &self,
        scheduler: &JobScheduler,
        roster: Arc<RosterClient>,
    ) -> Result<()> {
        let orchestrator = self.orchestrator.clone();
        let interval = self.settings.roster_interval_secs;

        let job = Job::new_repeated_async(Duration::from_secs(interval), move |_uuid, _lock| {
            let roster = roster.clone();
            let orchestrator = orchestrator.clone();
            Box::pin(async move {
                if let Err(e) = jobs::roster_refresh::run(&roster, orchestrator.store()).await {
                    error!("Failed to refresh operator roster: {:#}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        info!("Registered roster_refresh job (every {}s)", interval);
        Ok(())
    }
}
