pub mod abis;
pub mod config;
pub mod cron;
pub mod db;
pub mod error;
pub mod rpc;
pub mod snapshot;
pub mod utils;
pub mod worker;

pub use crate::config::Settings;
pub use cron::{CronScheduler, CronSettings};
pub use db::Database;
pub use error::SyncError;
pub use rpc::{ChainClient, RateGovernor};
pub use snapshot::{OperatorSnapshot, SnapshotHandle};
pub use worker::{RosterClient, SyncOrchestrator};
