//! Log decoding for staking contract logs.
//!
//! Classifies a raw `eth_getLogs` entry by its topic0 signature into a typed
//! [`Event`]. Anything that does not look like one of the three staking
//! events is rejected, which is a normal outcome rather than an error.
//! Decoding is pure: no I/O, no clock, no randomness.

use alloy::{
    primitives::{B256, U256},
    sol_types::SolEvent,
};

use crate::{
    abis::staking,
    db::models::{Event, EventType},
    rpc::RawLog,
    utils::{hex_encode, topic_to_address, NULL_OPERATOR},
};

/// Number of topics every staking event carries (signature + two addresses).
const EXPECTED_TOPICS: usize = 3;

/// Why a log was not turned into an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TopicCount(usize),
    UnknownSignature,
    /// Data payload wider than 256 bits
    OversizedAmount(usize),
}

/// Outcome of classifying one log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(Event),
    Rejected(Rejection),
}

/// Map a topic0 signature to the staking event it announces.
pub fn event_type_for(signature: &B256) -> Option<EventType> {
    if *signature == staking::Delegate::SIGNATURE_HASH {
        Some(EventType::Delegate)
    } else if *signature == staking::Undelegate::SIGNATURE_HASH {
        Some(EventType::Undelegate)
    } else if *signature == staking::Mint::SIGNATURE_HASH {
        Some(EventType::Mint)
    } else {
        None
    }
}

/// Classify a raw log.
///
/// - exactly three topics are required
/// - topic0 must be one of the Delegate, Undelegate or Mint signatures
/// - guardian and operator are the low 20 bytes of topic1 and topic2
/// - Mint events carry the `"Null"` operator regardless of topic2
/// - amount is the data payload read as an unsigned big-endian integer
pub fn classify(log: &RawLog) -> Decoded {
    if log.topics.len() != EXPECTED_TOPICS {
        return Decoded::Rejected(Rejection::TopicCount(log.topics.len()));
    }

    let Some(event_type) = event_type_for(&log.topics[0]) else {
        return Decoded::Rejected(Rejection::UnknownSignature);
    };

    let Some(amount) = U256::try_from_be_slice(&log.data) else {
        return Decoded::Rejected(Rejection::OversizedAmount(log.data.len()));
    };

    let guardian_address = topic_to_address(&log.topics[1]);
    let operator_address = match event_type {
        EventType::Mint => NULL_OPERATOR.to_string(),
        _ => topic_to_address(&log.topics[2]),
    };

    Decoded::Event(Event {
        block_number: log.block_number.to::<u64>(),
        tx_index: log.transaction_index.to::<u64>(),
        log_index: log.log_index_in_tx(),
        event_type,
        tx_hash: hex_encode(log.transaction_hash.as_slice()),
        block_hash: hex_encode(log.block_hash.as_slice()),
        block_timestamp: log.timestamp(),
        amount,
        guardian_address,
        operator_address,
    })
}

/// Result of decoding one fetched window.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Accepted events in fetch order
    pub events: Vec<Event>,
    pub rejected: u64,
}

/// Decode every log of a window, counting rejections.
pub fn parse_logs(logs: &[RawLog]) -> ParseResult {
    let mut result = ParseResult {
        events: Vec::with_capacity(logs.len()),
        rejected: 0,
    };

    for log in logs {
        match classify(log) {
            Decoded::Event(event) => result.events.push(event),
            Decoded::Rejected(_) => result.rejected += 1,
        }
    }

    result
}
