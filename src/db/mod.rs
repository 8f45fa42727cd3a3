use std::future::Future;

use log::{info, warn};
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::{config::Settings, error::SyncError};

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresClient;

use models::{Event, Operator, RosterEntry, SyncCheckpoint, UpsertOutcome};

/// Idempotent persistence of decoded events.
///
/// `upsert_event` matches on the natural key and classifies the write in a
/// single atomic step, so concurrent writers for the same key coalesce into
/// one stored record.
pub trait LogStore: Send + Sync {
    fn upsert_event(
        &self,
        event: &Event,
    ) -> impl Future<Output = Result<UpsertOutcome, SyncError>> + Send;

    /// Net delegated amount per operator: sum of Delegate minus sum of
    /// Undelegate amounts across every stored event.
    fn delegation_totals(
        &self,
    ) -> impl Future<Output = Result<FxHashMap<String, BigInt>, SyncError>> + Send;
}

/// Durable single-record "last fully synced height".
pub trait CheckpointStore: Send + Sync {
    fn get_checkpoint(
        &self,
    ) -> impl Future<Output = Result<Option<SyncCheckpoint>, SyncError>> + Send;

    fn set_checkpoint(
        &self,
        checkpoint: &SyncCheckpoint,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Operator aggregate rows.
pub trait OperatorStore: Send + Sync {
    fn get_operators(&self) -> impl Future<Output = Result<Vec<Operator>, SyncError>> + Send;

    /// Write roster metadata, leaving `delegated_count` untouched.
    fn upsert_roster_entry(
        &self,
        entry: &RosterEntry,
    ) -> impl Future<Output = Result<UpsertOutcome, SyncError>> + Send;

    /// Overwrite the cached delegated count, creating the row with default
    /// metadata when the operator is not yet known.
    fn set_delegated_count(
        &self,
        operator_address: &str,
        delegated_count: &BigInt,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Storage backend selected at startup.
///
/// PostgreSQL holds events, the checkpoint and operator aggregates. Without
/// a postgres section in the configuration everything lives in memory and
/// is lost on restart.
#[derive(Clone)]
pub enum Database {
    Postgres(PostgresClient),
    Memory(MemoryStore),
}

impl Database {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        match &settings.postgres {
            Some(pg) => {
                let postgres = PostgresClient::new(pg.clone()).await?;

                // Run migrations
                postgres.migrate().await?;

                info!("[DB] Using PostgreSQL storage");
                Ok(Database::Postgres(postgres))
            },
            None => {
                warn!("[DB] No postgres configured, using in-memory storage. Nothing will survive a restart");
                Ok(Database::Memory(MemoryStore::new()))
            },
        }
    }
}

impl LogStore for Database {
    async fn upsert_event(&self, event: &Event) -> Result<UpsertOutcome, SyncError> {
        match self {
            Database::Postgres(pg) => pg.upsert_event(event).await,
            Database::Memory(mem) => mem.upsert_event(event).await,
        }
    }

    async fn delegation_totals(&self) -> Result<FxHashMap<String, BigInt>, SyncError> {
        match self {
            Database::Postgres(pg) => pg.delegation_totals().await,
            Database::Memory(mem) => mem.delegation_totals().await,
        }
    }
}

impl CheckpointStore for Database {
    async fn get_checkpoint(&self) -> Result<Option<SyncCheckpoint>, SyncError> {
        match self {
            Database::Postgres(pg) => pg.get_checkpoint().await,
            Database::Memory(mem) => mem.get_checkpoint().await,
        }
    }

    async fn set_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), SyncError> {
        match self {
            Database::Postgres(pg) => pg.set_checkpoint(checkpoint).await,
            Database::Memory(mem) => mem.set_checkpoint(checkpoint).await,
        }
    }
}

impl OperatorStore for Database {
    async fn get_operators(&self) -> Result<Vec<Operator>, SyncError> {
        match self {
            Database::Postgres(pg) => pg.get_operators().await,
            Database::Memory(mem) => mem.get_operators().await,
        }
    }

    async fn upsert_roster_entry(&self, entry: &RosterEntry) -> Result<UpsertOutcome, SyncError> {
        match self {
            Database::Postgres(pg) => pg.upsert_roster_entry(entry).await,
            Database::Memory(mem) => mem.upsert_roster_entry(entry).await,
        }
    }

    async fn set_delegated_count(
        &self,
        operator_address: &str,
        delegated_count: &BigInt,
    ) -> Result<(), SyncError> {
        match self {
            Database::Postgres(pg) => pg.set_delegated_count(operator_address, delegated_count).await,
            Database::Memory(mem) => mem.set_delegated_count(operator_address, delegated_count).await,
        }
    }
}
