use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indexer sync progress checkpoint.
///
/// Single row holding the last block height whose logs were fully ingested.
/// Used to resume indexing after restarts without missing or duplicating data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub last_synced_height: u64,
    pub previous_height: u64,
    pub updated_at: DateTime<Utc>,
}

impl SyncCheckpoint {
    pub fn new(previous_height: u64, last_synced_height: u64) -> Self {
        Self {
            last_synced_height,
            previous_height,
            updated_at: Utc::now(),
        }
    }
}
