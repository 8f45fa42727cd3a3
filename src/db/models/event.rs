use alloy::primitives::U256;
use serde::Serialize;
use std::fmt;

/// Kind of staking log an event was decoded from.
///
/// The string form is part of the natural key stored in PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Delegate,
    Undelegate,
    Mint,
    /// Never produced by the decoder, which rejects unknown signatures
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Delegate => "delegate",
            EventType::Undelegate => "undelegate",
            EventType::Mint => "mint",
            EventType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key of a decoded log. Stable across re-fetches of the same range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub block_number: u64,
    pub tx_index: u64,
    pub log_index: u64,
    pub event_type: EventType,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.block_number, self.tx_index, self.log_index, self.event_type
        )
    }
}

/// Staking event decoded from a single log (PostgreSQL)
///
/// Primary Key: (block_number, tx_index, log_index, event_type)
/// Every non-key field is fully determined by the source log, so re-ingesting
/// the same log must leave the stored row untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    // Natural key
    pub block_number: u64,
    pub tx_index: u64,
    /// Position of the log inside its transaction
    pub log_index: u64,
    pub event_type: EventType,

    // Provenance (stored verbatim)
    pub tx_hash: String,
    pub block_hash: String,
    pub block_timestamp: u64,

    pub amount: U256,

    // Participants (lowercase hex, operator is "Null" for Mint)
    pub guardian_address: String,
    pub operator_address: String,
}

impl Event {
    pub fn key(&self) -> EventKey {
        EventKey {
            block_number: self.block_number,
            tx_index: self.tx_index,
            log_index: self.log_index,
            event_type: self.event_type,
        }
    }

    /// True when every non-key field matches `other`.
    pub fn same_content(&self, other: &Event) -> bool {
        self.tx_hash == other.tx_hash
            && self.block_hash == other.block_hash
            && self.block_timestamp == other.block_timestamp
            && self.amount == other.amount
            && self.guardian_address == other.guardian_address
            && self.operator_address == other.operator_address
    }
}

/// Classification returned by an idempotent upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Changed,
    Unchanged,
}
