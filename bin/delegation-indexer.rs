use std::sync::Arc;

use anyhow::Context;
use delegation_indexer::{
    ChainClient, CronScheduler, CronSettings, Database, RateGovernor, RosterClient, Settings,
    SnapshotHandle, SyncOrchestrator,
};
use jemallocator::Jemalloc;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Failed to initialize logger")?;

    // Load configuration
    let settings =
        Settings::new().context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    // One quota shared by the chain endpoint and the roster service
    let governor = Arc::new(RateGovernor::new(settings.rpc.max_requests_per_second));

    let chain = ChainClient::new(&settings.rpc, governor.clone())
        .context("Failed to initialize chain client")?;

    let db = Database::new(&settings)
        .await
        .context("Failed to initialize database connection")?;

    let snapshot = SnapshotHandle::new();
    let orchestrator = Arc::new(SyncOrchestrator::new(
        chain,
        db,
        settings.sync.clone(),
        snapshot,
    ));

    let roster = match &settings.roster {
        Some(roster_settings) => Some(Arc::new(
            RosterClient::new(roster_settings.clone(), governor.clone())
                .context("Failed to initialize roster client")?,
        )),
        None => {
            info!("No roster endpoint configured, operator metadata will not be refreshed");
            None
        },
    };

    run_indexer(settings, orchestrator, roster).await
}

async fn run_indexer(
    settings: Settings,
    orchestrator: Arc<SyncOrchestrator<ChainClient, Database>>,
    roster: Option<Arc<RosterClient>>,
) -> anyhow::Result<()> {
    let cancellation_token = CancellationToken::new();

    // Initial pass so operators are populated before the first tick
    if let Some(roster) = &roster {
        if let Err(e) = roster.refresh_roster(orchestrator.store()).await {
            warn!("Initial roster refresh failed: {:#}", e);
        }
    }
    if let Err(e) = orchestrator.run_cycle().await {
        warn!("Initial sync cycle failed: {}", e);
    }

    let cron_settings = CronSettings {
        sync_interval_secs: settings.sync.interval_secs,
        roster_interval_secs: settings
            .roster
            .as_ref()
            .map(|r| r.interval_secs)
            .unwrap_or_else(|| CronSettings::default().roster_interval_secs),
    };
    let cron_scheduler = CronScheduler::new(orchestrator.clone(), roster, cron_settings);

    let cron_token = cancellation_token.child_token();
    let cron_handle = tokio::spawn(async move {
        if let Err(e) = cron_scheduler.run(cron_token).await {
            error!("Cron scheduler failed: {:#}", e);
        }
    });

    info!("Cron scheduler started - sync and roster jobs will run periodically");

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Indexer running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    info!("Finishing all tasks...");
    cancellation_token.cancel();

    info!("Waiting for cron scheduler to stop...");
    let _ = cron_handle.await;

    info!(
        "Stopped at checkpoint height {}",
        orchestrator.snapshot().load().height
    );
    Ok(())
}
