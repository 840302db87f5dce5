//! Pool records and lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Unique identifier for a pool.
///
/// Ids are minted monotonically by the ownership registry at creation time.
/// Allocations produced by strategies share this id space — every allocation
/// is itself a pool-like record downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub u64);

impl PoolId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool_{}", self.0)
    }
}

impl From<u64> for PoolId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Lifecycle of a pool, derived from its remaining balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Tokens remain to dispense.
    Active,
    /// Nothing left to dispense. Consumed markers outlive this state.
    Exhausted,
}

/// A registered token pool.
///
/// `remaining` only ever decreases (a failed dispense restores exactly what
/// it reserved, nothing more). The signer is fixed at creation and is the
/// sole authority for claims against this pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    /// Address whose signature authorizes claims against this pool.
    pub signer: Address,
    /// Token held on the pool's behalf by the custody collaborator.
    pub token: Address,
    /// Base units still available to dispense.
    pub remaining: u128,
}

impl Pool {
    pub fn new(id: PoolId, signer: Address, token: Address, remaining: u128) -> Self {
        Self {
            id,
            signer,
            token,
            remaining,
        }
    }

    pub fn status(&self) -> PoolStatus {
        if self.remaining == 0 {
            PoolStatus::Exhausted
        } else {
            PoolStatus::Active
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.status() == PoolStatus::Exhausted
    }
}
