//! Sync orchestrator.
//!
//! One cycle walks `Idle -> FetchingHeight -> Syncing(strategy) ->
//! Recomputing -> Checkpointing -> Idle`. Any chain failure moves the cycle
//! to `Aborted` and leaves the checkpoint where it was, so the next cycle
//! re-requests the same ranges and the idempotent upsert absorbs repeats.

use std::{
    fmt,
    sync::Mutex as StdMutex,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::{
    config::SyncSettings,
    db::{
        models::{Event, SyncCheckpoint, UpsertOutcome},
        CheckpointStore, LogStore, OperatorStore,
    },
    error::SyncError,
    rpc::ChainSource,
    snapshot::{OperatorSnapshot, SnapshotHandle},
    worker::{aggregates, parser},
};

/// Interval for logging progress updates during long catch-ups (10 seconds)
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// How the block range of a cycle is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Chain height has not moved past the checkpoint
    UpToDate,
    /// No checkpoint yet: `[1, current]` in bulk-sized windows
    ColdSync,
    /// Gap fits one window: a single fetch of `[checkpoint + 1, current]`
    SingleWindowCatchUp,
    /// Gap exceeds one window: consecutive windows processed in order
    MultiWindowCatchUp,
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStrategy::UpToDate => "up-to-date",
            SyncStrategy::ColdSync => "cold sync",
            SyncStrategy::SingleWindowCatchUp => "single-window catch-up",
            SyncStrategy::MultiWindowCatchUp => "multi-window catch-up",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    FetchingHeight,
    Syncing(SyncStrategy),
    Recomputing,
    Checkpointing,
    Aborted,
}

/// Inclusive block range fetched with one `eth_getLogs` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub strategy: SyncStrategy,
    pub windows: Vec<BlockWindow>,
}

/// Split `[from, to]` into consecutive windows of at most `size` blocks.
fn split_range(from: u64, to: u64, size: u64) -> Vec<BlockWindow> {
    let size = size.max(1);
    let mut windows = Vec::new();
    let mut start = from;

    while start <= to {
        let end = start.saturating_add(size - 1).min(to);
        windows.push(BlockWindow { from: start, to: end });
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }

    windows
}

/// Decide the strategy and windows for a cycle.
pub fn plan_sync(checkpoint_height: u64, current_height: u64, settings: &SyncSettings) -> SyncPlan {
    if checkpoint_height == 0 {
        let windows = split_range(1, current_height, settings.bulk_blocks_per_fetch);
        let strategy = if windows.is_empty() {
            SyncStrategy::UpToDate
        } else {
            SyncStrategy::ColdSync
        };
        return SyncPlan { strategy, windows };
    }

    if current_height <= checkpoint_height {
        return SyncPlan {
            strategy: SyncStrategy::UpToDate,
            windows: Vec::new(),
        };
    }

    let from = checkpoint_height + 1;
    if current_height - checkpoint_height <= settings.max_blocks_per_fetch {
        SyncPlan {
            strategy: SyncStrategy::SingleWindowCatchUp,
            windows: vec![BlockWindow {
                from,
                to: current_height,
            }],
        }
    } else {
        SyncPlan {
            strategy: SyncStrategy::MultiWindowCatchUp,
            windows: split_range(from, current_height, settings.max_blocks_per_fetch),
        }
    }
}

/// Counters for one cycle. A fresh report is created at the start of every
/// cycle and logged at its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub strategy: SyncStrategy,
    pub from_block: u64,
    pub to_block: u64,
    pub windows: usize,
    pub created: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub rejected: u64,
    pub store_errors: u64,
    pub aggregates_corrected: usize,
    pub elapsed: Duration,
}

impl SyncReport {
    fn new(strategy: SyncStrategy, from_block: u64, to_block: u64) -> Self {
        Self {
            strategy,
            from_block,
            to_block,
            windows: 0,
            created: 0,
            changed: 0,
            unchanged: 0,
            rejected: 0,
            store_errors: 0,
            aggregates_corrected: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Completed, but some records could not be written.
    pub fn is_degraded(&self) -> bool {
        self.store_errors > 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}] in {} window(s): {} created, {} changed, {} unchanged, {} rejected, {} store errors, {} aggregates corrected ({:?})",
            self.strategy,
            self.from_block,
            self.to_block,
            self.windows,
            self.created,
            self.changed,
            self.unchanged,
            self.rejected,
            self.store_errors,
            self.aggregates_corrected,
            self.elapsed
        )
    }
}

/// Sequences checkpoint read, height fetch, windowed log ingestion,
/// aggregate recomputation and checkpoint write.
pub struct SyncOrchestrator<C, S> {
    chain: C,
    store: S,
    settings: SyncSettings,
    snapshot: SnapshotHandle,
    /// Held for the whole cycle; a second caller is refused, not queued
    cycle_guard: Mutex<()>,
    phase: StdMutex<SyncPhase>,
}

impl<C, S> SyncOrchestrator<C, S>
where
    C: ChainSource,
    S: LogStore + CheckpointStore + OperatorStore,
{
    pub fn new(chain: C, store: S, settings: SyncSettings, snapshot: SnapshotHandle) -> Self {
        Self {
            chain,
            store,
            settings,
            snapshot,
            cycle_guard: Mutex::new(()),
            phase: StdMutex::new(SyncPhase::Idle),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> &SnapshotHandle {
        &self.snapshot
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: SyncPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        debug!("[SYNC] {:?} -> {:?}", *phase, next);
        *phase = next;
    }

    /// Run one full sync cycle.
    ///
    /// Returns [`SyncError::CycleInProgress`] without doing anything when
    /// another cycle is still running.
    pub async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        let _guard = self
            .cycle_guard
            .try_lock()
            .map_err(|_| SyncError::CycleInProgress)?;

        let started = Instant::now();
        match self.sync().await {
            Ok(mut report) => {
                report.elapsed = started.elapsed();
                self.transition(SyncPhase::Idle);
                if report.is_degraded() {
                    warn!("[SYNC] Cycle completed degraded: {}", report);
                } else {
                    info!("[SYNC] Cycle completed: {}", report);
                }
                Ok(report)
            },
            Err(e) => {
                self.transition(SyncPhase::Aborted);
                warn!(
                    "[SYNC] Cycle aborted after {:?}, checkpoint untouched: {}",
                    started.elapsed(),
                    e
                );
                Err(e)
            },
        }
    }

    async fn sync(&self) -> Result<SyncReport, SyncError> {
        self.transition(SyncPhase::FetchingHeight);

        let checkpoint_height = self
            .store
            .get_checkpoint()
            .await?
            .map(|c| c.last_synced_height)
            .unwrap_or(0);
        let current_height = self.chain.current_height().await?;

        let plan = plan_sync(checkpoint_height, current_height, &self.settings);
        let mut report = SyncReport::new(
            plan.strategy,
            plan.windows.first().map(|w| w.from).unwrap_or(current_height),
            current_height,
        );

        if plan.strategy == SyncStrategy::UpToDate {
            debug!(
                "[SYNC] Nothing to do: checkpoint {} >= chain height {}",
                checkpoint_height, current_height
            );
            self.publish_snapshot(checkpoint_height).await;
            return Ok(report);
        }

        info!(
            "[SYNC] {} from block {} to {} ({} window(s))",
            plan.strategy,
            report.from_block,
            current_height,
            plan.windows.len()
        );
        self.transition(SyncPhase::Syncing(plan.strategy));

        let mut last_progress_log = Instant::now();
        for (i, window) in plan.windows.iter().enumerate() {
            let logs = self.chain.logs_in_range(window.from, window.to).await?;

            let parsed = parser::parse_logs(&logs);
            report.rejected += parsed.rejected;
            self.persist(&parsed.events, &mut report).await;
            report.windows += 1;

            if last_progress_log.elapsed() >= PROGRESS_LOG_INTERVAL {
                info!(
                    "[SYNC] Progress: window {}/{} (block {}), {} created so far",
                    i + 1,
                    plan.windows.len(),
                    window.to,
                    report.created
                );
                last_progress_log = Instant::now();
            }
        }

        self.transition(SyncPhase::Recomputing);
        match aggregates::recompute(&self.store).await {
            Ok(recompute) => {
                report.aggregates_corrected = recompute.corrected;
                report.store_errors += recompute.store_errors as u64;
            },
            Err(e) => {
                warn!("[SYNC] Aggregate recomputation failed, retrying next cycle: {}", e);
                report.store_errors += 1;
            },
        }

        self.transition(SyncPhase::Checkpointing);
        let checkpoint = SyncCheckpoint::new(checkpoint_height, current_height);
        self.store.set_checkpoint(&checkpoint).await?;

        self.publish_snapshot(current_height).await;

        Ok(report)
    }

    /// Upsert a window's events with bounded concurrency. Store failures are
    /// counted per record and never abort the window.
    async fn persist(&self, events: &[Event], report: &mut SyncReport) {
        for chunk in events.chunks(self.settings.upsert_concurrency.max(1)) {
            let tasks: Vec<_> = chunk
                .iter()
                .map(|event| self.store.upsert_event(event))
                .collect();
            let outcomes = futures::future::join_all(tasks).await;

            for (event, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(UpsertOutcome::Created) => report.created += 1,
                    Ok(UpsertOutcome::Changed) => report.changed += 1,
                    Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                    Err(e) => {
                        warn!("[SYNC] Skipping event {}: {}", event.key(), e);
                        report.store_errors += 1;
                    },
                }
            }
        }
    }

    async fn publish_snapshot(&self, height: u64) {
        match self.store.get_operators().await {
            Ok(operators) => self.snapshot.publish(OperatorSnapshot::new(height, operators)),
            Err(e) => warn!("[SYNC] Keeping previous snapshot, operators unreadable: {}", e),
        }
    }
}
