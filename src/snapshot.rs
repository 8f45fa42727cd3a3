//! Published operator snapshot.
//!
//! The sync cycle publishes a fresh, immutable snapshot after each successful
//! run. Readers (the query API) load it through an `ArcSwap` without taking
//! any lock, and keep a consistent view until they drop their `Arc`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::Operator;

#[derive(Debug, Clone, Serialize)]
pub struct OperatorSnapshot {
    /// Checkpoint height the aggregates were computed at
    pub height: u64,
    pub published_at: DateTime<Utc>,
    /// Sorted by operator address
    pub operators: Vec<Operator>,
}

impl OperatorSnapshot {
    pub fn new(height: u64, mut operators: Vec<Operator>) -> Self {
        operators.sort_by(|a, b| a.operator_address.cmp(&b.operator_address));
        Self {
            height,
            published_at: Utc::now(),
            operators,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Slice of at most `limit` operators starting at `offset`.
    pub fn page(&self, offset: usize, limit: usize) -> &[Operator] {
        let start = offset.min(self.operators.len());
        let end = start.saturating_add(limit).min(self.operators.len());
        &self.operators[start..end]
    }

    pub fn get(&self, operator_address: &str) -> Option<&Operator> {
        let address = operator_address.to_lowercase();
        self.operators
            .binary_search_by(|o| o.operator_address.as_str().cmp(address.as_str()))
            .ok()
            .map(|i| &self.operators[i])
    }
}

/// Shared handle to the latest snapshot.
#[derive(Clone)]
pub struct SnapshotHandle {
    inner: Arc<ArcSwap<OperatorSnapshot>>,
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(OperatorSnapshot::empty())),
        }
    }
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: OperatorSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    pub fn load(&self) -> Arc<OperatorSnapshot> {
        self.inner.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operators(addresses: &[&str]) -> Vec<Operator> {
        addresses
            .iter()
            .map(|a| Operator::with_defaults(a.to_string()))
            .collect()
    }

    #[test]
    fn test_page_bounds() {
        let snapshot = OperatorSnapshot::new(10, operators(&["0x03", "0x01", "0x02"]));

        assert_eq!(snapshot.page(0, 2).len(), 2);
        assert_eq!(snapshot.page(0, 2)[0].operator_address, "0x01");
        assert_eq!(snapshot.page(2, 10).len(), 1);
        assert!(snapshot.page(5, 10).is_empty());
    }

    #[test]
    fn test_readers_keep_their_view() {
        let handle = SnapshotHandle::new();
        let before = handle.load();

        handle.publish(OperatorSnapshot::new(7, operators(&["0x0a"])));

        assert_eq!(before.height, 0);
        assert!(before.operators.is_empty());
        assert_eq!(handle.load().height, 7);
        assert!(handle.load().get("0x0A").is_some());
    }
}
