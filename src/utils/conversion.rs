//! Type conversion and formatting utilities.
//!
//! Functions for converting between alloy primitives, arbitrary-precision
//! integers and the textual forms used by PostgreSQL `NUMERIC` columns.

use alloy::primitives::{hex, B256, U256};
use num_bigint::{BigInt, Sign};
use std::str::FromStr;

// ============================================
// Hex Encoding
// ============================================

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Lowercase address taken from the low 20 bytes of an indexed topic.
pub fn topic_to_address(topic: &B256) -> String {
    hex_encode(&topic.as_slice()[12..])
}

// ============================================
// Integer Conversions
// ============================================

/// Convert alloy U256 to a signed arbitrary-precision integer.
pub fn u256_to_bigint(value: U256) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>())
}

/// Parse a decimal string into BigInt. Postgres may render whole numerics
/// with a trailing `.0...` after aggregation, which is stripped first.
pub fn decimal_to_bigint(s: &str) -> Option<BigInt> {
    let s = s.trim();
    let integral = match s.split_once('.') {
        Some((int_part, frac)) if frac.chars().all(|c| c == '0') => int_part,
        Some(_) => return None,
        None => s,
    };
    BigInt::from_str(integral).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_to_address_takes_low_bytes() {
        let topic = B256::from_str(
            "0x000000000000000000000000A0B86991C6218B36C1D19D4A2E9EB0CE3606EB48",
        )
        .unwrap();
        assert_eq!(
            topic_to_address(&topic),
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        );
    }

    #[test]
    fn test_decimal_to_bigint_handles_numeric_scale() {
        assert_eq!(decimal_to_bigint("-42"), Some(BigInt::from(-42)));
        assert_eq!(decimal_to_bigint("6.000"), Some(BigInt::from(6)));
        assert_eq!(decimal_to_bigint("6.5"), None);
    }

    #[test]
    fn test_u256_to_bigint_max() {
        let max = u256_to_bigint(U256::MAX);
        assert_eq!(max.to_string(), U256::MAX.to_string());
    }
}
