use alloy::primitives::{Bytes, B256, U64};
use serde::Deserialize;

/// Log entry as returned by `eth_getLogs`.
///
/// All quantities are hex encoded on the wire. `transactionLogIndex` and
/// `blockTimestamp` are node extensions and may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default)]
    pub address: Option<String>,
    pub block_number: U64,
    pub block_hash: B256,
    #[serde(default)]
    pub block_timestamp: Option<U64>,
    pub transaction_hash: B256,
    pub transaction_index: U64,
    #[serde(default)]
    pub transaction_log_index: Option<U64>,
    pub log_index: U64,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub topics: Vec<B256>,
}

impl RawLog {
    /// Position of the log inside its transaction, falling back to the
    /// block-level index when the node does not report it.
    ///
    /// The two sources number logs differently, so switching to a provider
    /// with the other behavior changes the natural key of logs already
    /// stored and a re-fetch of the same range stores them a second time.
    /// Stay on one provider kind for the lifetime of a database.
    pub fn log_index_in_tx(&self) -> u64 {
        self.transaction_log_index
            .unwrap_or(self.log_index)
            .to::<u64>()
    }

    pub fn timestamp(&self) -> u64 {
        self.block_timestamp.map(|t| t.to::<u64>()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "address": "0xd8e3a935706c08b5e6f8e05d63d3e67ce2ae330c",
        "blockNumber": "0x1b4",
        "transactionHash": "0x5f0c1a44e2f8f8ef8f2b74b3a8e5c0c8b0f6f2d1d6e5a3c7b9a2c4d6e8f0a1b2",
        "transactionIndex": "0x2",
        "transactionLogIndex": "0x1",
        "blockHash": "0x9a1c2b3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9",
        "blockTimestamp": "0x6553f100",
        "data": "0x0000000000000000000000000000000000000000000000000000000000000005",
        "logIndex": "0x7",
        "removed": false,
        "topics": [
            "0x510b11bb3f3c799b11307c01ab7db0d335683ef5b2da98f7697de744f465eacc",
            "0x0000000000000000000000001111111111111111111111111111111111111111",
            "0x0000000000000000000000002222222222222222222222222222222222222222"
        ]
    }"#;

    #[test]
    fn test_decodes_hex_quantities() {
        let log: RawLog = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(log.block_number.to::<u64>(), 436);
        assert_eq!(log.transaction_index.to::<u64>(), 2);
        assert_eq!(log.log_index_in_tx(), 1);
        assert_eq!(log.timestamp(), 0x6553f100);
        assert_eq!(log.topics.len(), 3);
        assert_eq!(log.data.len(), 32);
    }

    #[test]
    fn test_missing_extensions_fall_back() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("transactionLogIndex");
        obj.remove("blockTimestamp");

        let log: RawLog = serde_json::from_value(value).unwrap();

        assert_eq!(log.log_index_in_tx(), 7);
        assert_eq!(log.timestamp(), 0);
    }
}
