//! Event signals emitted by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::pool::PoolId;

/// Notifications the engine hands to its event sink, in emission order.
///
/// A successful dispense emits one `TokensDispensed` followed by one
/// `PoolCreated` per allocation. A failed dispense emits nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DispenserEvent {
    /// A new pool was funded and registered.
    PoolDeposited {
        pool_id: PoolId,
        signer: Address,
        token: Address,
        amount: u128,
        timestamp: DateTime<Utc>,
    },
    /// A claim settled: `dispensed` base units left the pool.
    TokensDispensed {
        pool_id: PoolId,
        receiver: Address,
        dispensed: u128,
        remaining: u128,
        timestamp: DateTime<Utc>,
    },
    /// A strategy minted a new allocation for a receiver.
    PoolCreated {
        allocation_id: PoolId,
        strategy: Address,
        timestamp: DateTime<Utc>,
    },
}

impl DispenserEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DispenserEvent::PoolDeposited { timestamp, .. }
            | DispenserEvent::TokensDispensed { timestamp, .. }
            | DispenserEvent::PoolCreated { timestamp, .. } => *timestamp,
        }
    }

    /// Short name for logs and dashboards.
    pub fn kind(&self) -> &'static str {
        match self {
            DispenserEvent::PoolDeposited { .. } => "pool_deposited",
            DispenserEvent::TokensDispensed { .. } => "tokens_dispensed",
            DispenserEvent::PoolCreated { .. } => "pool_created",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_by_variant_name() {
        let event = DispenserEvent::PoolCreated {
            allocation_id: PoolId(9),
            strategy: Address([3; 20]),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PoolCreated");
        assert_eq!(json["allocation_id"], 9);
    }

    #[test]
    fn kind_names_are_stable() {
        let event = DispenserEvent::TokensDispensed {
            pool_id: PoolId(1),
            receiver: Address::ZERO,
            dispensed: 1,
            remaining: 0,
            timestamp: Utc::now(),
        };
        assert_eq!(event.kind(), "tokens_dispensed");
    }
}
