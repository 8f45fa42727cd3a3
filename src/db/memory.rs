//! In-process storage backend.
//!
//! Implements the same store contracts as PostgreSQL on top of mutex-guarded
//! maps. Every match-and-write happens under a single lock acquisition, which
//! gives the same coalescing guarantee as `INSERT ... ON CONFLICT`.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::{
    db::{
        models::{
            Event, EventKey, EventType, Operator, RosterEntry, SyncCheckpoint, UpsertOutcome,
        },
        CheckpointStore, LogStore, OperatorStore,
    },
    error::SyncError,
    utils::{u256_to_bigint, NULL_OPERATOR},
};

#[derive(Default)]
struct MemoryState {
    events: BTreeMap<EventKey, Event>,
    checkpoint: Option<SyncCheckpoint>,
    operators: BTreeMap<String, Operator>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, SyncError> {
        self.state
            .lock()
            .map_err(|_| SyncError::StoreUnavailable("memory store lock poisoned".to_string()))
    }

    /// Number of stored events.
    pub fn event_count(&self) -> usize {
        self.lock().map(|s| s.events.len()).unwrap_or(0)
    }

    pub fn get_event(&self, key: &EventKey) -> Option<Event> {
        self.lock().ok().and_then(|s| s.events.get(key).cloned())
    }

    pub fn get_operator(&self, operator_address: &str) -> Option<Operator> {
        self.lock()
            .ok()
            .and_then(|s| s.operators.get(operator_address).cloned())
    }
}

impl LogStore for MemoryStore {
    async fn upsert_event(&self, event: &Event) -> Result<UpsertOutcome, SyncError> {
        let mut state = self.lock()?;
        let outcome = match state.events.get_mut(&event.key()) {
            Some(stored) if stored.same_content(event) => UpsertOutcome::Unchanged,
            Some(stored) => {
                *stored = event.clone();
                UpsertOutcome::Changed
            },
            None => {
                state.events.insert(event.key(), event.clone());
                UpsertOutcome::Created
            },
        };
        Ok(outcome)
    }

    async fn delegation_totals(&self) -> Result<FxHashMap<String, BigInt>, SyncError> {
        let state = self.lock()?;
        let mut totals: FxHashMap<String, BigInt> = FxHashMap::default();

        for event in state.events.values() {
            if event.operator_address == NULL_OPERATOR {
                continue;
            }
            let amount = u256_to_bigint(event.amount);
            match event.event_type {
                EventType::Delegate => {
                    *totals.entry(event.operator_address.clone()).or_default() += amount;
                },
                EventType::Undelegate => {
                    *totals.entry(event.operator_address.clone()).or_default() -= amount;
                },
                EventType::Mint | EventType::Unknown => {},
            }
        }

        Ok(totals)
    }
}

impl CheckpointStore for MemoryStore {
    async fn get_checkpoint(&self) -> Result<Option<SyncCheckpoint>, SyncError> {
        Ok(self.lock()?.checkpoint.clone())
    }

    /// Lower heights than the stored one are ignored, matching PostgreSQL.
    async fn set_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), SyncError> {
        let mut state = self.lock()?;
        let stale = state
            .checkpoint
            .as_ref()
            .is_some_and(|c| c.last_synced_height > checkpoint.last_synced_height);
        if !stale {
            state.checkpoint = Some(checkpoint.clone());
        }
        Ok(())
    }
}

impl OperatorStore for MemoryStore {
    async fn get_operators(&self) -> Result<Vec<Operator>, SyncError> {
        Ok(self.lock()?.operators.values().cloned().collect())
    }

    async fn upsert_roster_entry(&self, entry: &RosterEntry) -> Result<UpsertOutcome, SyncError> {
        let mut state = self.lock()?;
        let outcome = match state.operators.get_mut(&entry.operator_address) {
            Some(operator) if entry.matches(operator) => UpsertOutcome::Unchanged,
            Some(operator) => {
                operator.active = entry.active;
                operator.rewards = entry.rewards.clone();
                operator.fee = entry.fee;
                operator.uptime = entry.uptime;
                operator.updated_at = Utc::now();
                UpsertOutcome::Changed
            },
            None => {
                let mut operator = Operator::with_defaults(entry.operator_address.clone());
                operator.active = entry.active;
                operator.rewards = entry.rewards.clone();
                operator.fee = entry.fee;
                operator.uptime = entry.uptime;
                state
                    .operators
                    .insert(entry.operator_address.clone(), operator);
                UpsertOutcome::Created
            },
        };
        Ok(outcome)
    }

    async fn set_delegated_count(
        &self,
        operator_address: &str,
        delegated_count: &BigInt,
    ) -> Result<(), SyncError> {
        let mut state = self.lock()?;
        let operator = state
            .operators
            .entry(operator_address.to_string())
            .or_insert_with(|| Operator::with_defaults(operator_address.to_string()));
        operator.delegated_count = delegated_count.clone();
        operator.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn delegate(block_number: u64, log_index: u64, amount: u64) -> Event {
        Event {
            block_number,
            tx_index: 0,
            log_index,
            event_type: EventType::Delegate,
            tx_hash: format!("0x{:064x}", block_number),
            block_hash: format!("0x{:064x}", block_number + 1),
            block_timestamp: 1_700_000_000,
            amount: U256::from(amount),
            guardian_address: "0x1111111111111111111111111111111111111111".to_string(),
            operator_address: "0x2222222222222222222222222222222222222222".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let event = delegate(10, 0, 5);

        assert_eq!(store.upsert_event(&event).await.unwrap(), UpsertOutcome::Created);
        for _ in 0..5 {
            assert_eq!(
                store.upsert_event(&event).await.unwrap(),
                UpsertOutcome::Unchanged
            );
        }
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_reports_changed_content() {
        let store = MemoryStore::new();
        let event = delegate(10, 0, 5);
        store.upsert_event(&event).await.unwrap();

        let mut corrected = event.clone();
        corrected.amount = U256::from(7);

        assert_eq!(
            store.upsert_event(&corrected).await.unwrap(),
            UpsertOutcome::Changed
        );
        assert_eq!(store.get_event(&event.key()).unwrap().amount, U256::from(7));
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_coalesce() {
        let store = MemoryStore::new();
        let event = delegate(42, 3, 9);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let event = event.clone();
                tokio::spawn(async move { store.upsert_event(&event).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == UpsertOutcome::Created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn test_roster_entry_keeps_delegated_count() {
        let store = MemoryStore::new();
        let address = "0x2222222222222222222222222222222222222222";
        store
            .set_delegated_count(address, &BigInt::from(12))
            .await
            .unwrap();

        let entry = RosterEntry {
            operator_address: address.to_string(),
            active: true,
            rewards: "100".to_string(),
            fee: 5.0,
            uptime: 99.5,
        };
        assert_eq!(
            store.upsert_roster_entry(&entry).await.unwrap(),
            UpsertOutcome::Changed
        );
        assert_eq!(
            store.upsert_roster_entry(&entry).await.unwrap(),
            UpsertOutcome::Unchanged
        );

        let operator = store.get_operator(address).unwrap();
        assert_eq!(operator.delegated_count, BigInt::from(12));
        assert!(operator.active);
    }
}
