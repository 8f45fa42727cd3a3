//! Raw log builders shared by worker tests.

use alloy::{
    primitives::{hex, Bytes, B256, U256, U64},
    sol_types::SolEvent,
};

use crate::{abis::staking, rpc::RawLog};

pub const GUARDIAN: &str = "0x1111111111111111111111111111111111111111";
pub const OPERATOR_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const OPERATOR_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

pub fn address_topic(address: &str) -> B256 {
    let mut bytes = [0u8; 32];
    let raw = hex::decode(address).expect("valid address");
    bytes[12..].copy_from_slice(&raw);
    B256::from(bytes)
}

pub fn staking_log(
    signature: B256,
    block_number: u64,
    log_index: u64,
    operator: &str,
    amount: u64,
) -> RawLog {
    RawLog {
        address: None,
        block_number: U64::from(block_number),
        block_hash: B256::from(U256::from(block_number).to_be_bytes::<32>()),
        block_timestamp: Some(U64::from(1_700_000_000 + block_number)),
        transaction_hash: B256::from(U256::from(block_number * 1_000 + log_index).to_be_bytes::<32>()),
        transaction_index: U64::from(0),
        transaction_log_index: Some(U64::from(log_index)),
        log_index: U64::from(log_index),
        data: Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec()),
        topics: vec![signature, address_topic(GUARDIAN), address_topic(operator)],
    }
}

pub fn delegate_log(block_number: u64, log_index: u64, operator: &str, amount: u64) -> RawLog {
    staking_log(
        staking::Delegate::SIGNATURE_HASH,
        block_number,
        log_index,
        operator,
        amount,
    )
}

pub fn undelegate_log(block_number: u64, log_index: u64, operator: &str, amount: u64) -> RawLog {
    staking_log(
        staking::Undelegate::SIGNATURE_HASH,
        block_number,
        log_index,
        operator,
        amount,
    )
}

/// A log from an unrelated contract event (two topics only).
pub fn foreign_log(block_number: u64, log_index: u64) -> RawLog {
    let mut log = delegate_log(block_number, log_index, OPERATOR_A, 0);
    log.topics.truncate(2);
    log
}
