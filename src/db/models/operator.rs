use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::Serialize;

/// Operator aggregate and roster metadata (PostgreSQL)
///
/// Primary Key: operator_address
/// `delegated_count` is derived from stored events by the aggregate
/// recomputer; the remaining fields come from the roster service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operator {
    pub operator_address: String,
    #[serde(serialize_with = "serialize_bigint")]
    pub delegated_count: BigInt,

    // Roster metadata
    pub active: bool,
    pub rewards: String,
    pub fee: f64,
    pub uptime: f64,

    pub updated_at: DateTime<Utc>,
}

impl Operator {
    /// Row for an operator first seen through its events, before the roster
    /// has reported on it.
    pub fn with_defaults(operator_address: String) -> Self {
        Self {
            operator_address,
            delegated_count: BigInt::default(),
            active: false,
            rewards: "0".to_string(),
            fee: 0.0,
            uptime: 0.0,
            updated_at: Utc::now(),
        }
    }
}

/// Roster-supplied metadata for one operator.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub operator_address: String,
    pub active: bool,
    pub rewards: String,
    pub fee: f64,
    pub uptime: f64,
}

impl RosterEntry {
    pub fn matches(&self, operator: &Operator) -> bool {
        self.active == operator.active
            && self.rewards == operator.rewards
            && self.fee == operator.fee
            && self.uptime == operator.uptime
    }
}

fn serialize_bigint<S: serde::Serializer>(v: &BigInt, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}
