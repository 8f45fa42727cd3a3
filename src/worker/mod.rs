pub mod aggregates;
pub mod parser;
pub mod roster;
pub mod sync;

#[cfg(test)]
pub(crate) mod fixtures;

pub use aggregates::{recompute, RecomputeReport};
pub use parser::{classify, parse_logs, Decoded, ParseResult, Rejection};
pub use roster::{apply_roster, RosterClient, RosterReport};
pub use sync::{
    plan_sync, BlockWindow, SyncOrchestrator, SyncPhase, SyncPlan, SyncReport, SyncStrategy,
};
