//! Utility functions for the delegation indexer.
//!
//! - [`conversion`] - Hex encoding, topic/address extraction, integer conversions

mod conversion;

// ============================================
// Common Constants
// ============================================

/// Operator placeholder stored for Mint events, which carry no operator.
pub const NULL_OPERATOR: &str = "Null";

// ============================================
// Re-exports
// ============================================

pub use conversion::{decimal_to_bigint, hex_encode, topic_to_address, u256_to_bigint};
