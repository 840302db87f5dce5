//! Claim requests, splits, signatures, and replay keys.
//!
//! A claim is the tuple a pool's signer commits to: which pool, until when,
//! for whom, and how the amount splits across strategies. The signature is
//! detached — it travels next to the claim, never inside it, because the
//! digest covers the claim alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::pool::PoolId;

/// One slice of a claim: the strategy that will create the allocation and
/// its raw parameters.
///
/// `params[0]` is always interpreted as the split amount; the rest is opaque
/// to the core (unlock times, vesting windows — whatever the strategy needs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub strategy: Address,
    pub params: Vec<u128>,
}

impl Split {
    pub fn new(strategy: Address, params: Vec<u128>) -> Self {
        Self { strategy, params }
    }

    /// The amount this split reserves — `params[0]`, or 0 when params is empty.
    pub fn amount(&self) -> u128 {
        self.params.first().copied().unwrap_or(0)
    }
}

/// A claim against a pool, exactly as covered by the signer's digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub pool_id: PoolId,
    /// Unix seconds; the authorization is dead once `now > valid_until`.
    pub valid_until: u64,
    /// Account the allocations are created for.
    pub receiver: Address,
    pub splits: Vec<Split>,
}

impl ClaimRequest {
    pub fn new(pool_id: PoolId, valid_until: u64, receiver: Address, splits: Vec<Split>) -> Self {
        Self {
            pool_id,
            valid_until,
            receiver,
            splits,
        }
    }

    /// Checked sum of all split amounts. `None` on u128 overflow.
    pub fn total(&self) -> Option<u128> {
        self.splits
            .iter()
            .try_fold(0u128, |acc, split| acc.checked_add(split.amount()))
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now > self.valid_until
    }
}

/// A detached signature, expected to be 65 bytes (`r ‖ s ‖ v`) for valid
/// claims. Length is enforced at verification time, not construction, so
/// malformed inputs surface as typed errors instead of being unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBytes(pub Vec<u8>);

impl SignatureBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Permanent identity of a consumed claim.
///
/// keccak-256 over the canonical packed claim tuple concatenated with the
/// signature bytes, so the marker pins the exact authorization that was
/// spent. Any change to any field — one more split, one different param,
/// a re-signed signature — yields a different key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimKey(pub [u8; 32]);

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn split_amount_is_first_param() {
        let split = Split::new(addr(1), vec![500, 1234]);
        assert_eq!(split.amount(), 500);
    }

    #[test]
    fn split_amount_defaults_to_zero_for_empty_params() {
        let split = Split::new(addr(1), vec![]);
        assert_eq!(split.amount(), 0);
    }

    #[test]
    fn total_sums_all_splits() {
        let claim = ClaimRequest::new(
            PoolId(1),
            1_000,
            addr(2),
            vec![Split::new(addr(3), vec![300]), Split::new(addr(4), vec![200, 99])],
        );
        assert_eq!(claim.total(), Some(500));
    }

    #[test]
    fn total_detects_overflow() {
        let claim = ClaimRequest::new(
            PoolId(1),
            1_000,
            addr(2),
            vec![
                Split::new(addr(3), vec![u128::MAX]),
                Split::new(addr(4), vec![1]),
            ],
        );
        assert_eq!(claim.total(), None);
    }

    #[test]
    fn expiry_is_strictly_after_valid_until() {
        let claim = ClaimRequest::new(PoolId(1), 100, addr(2), vec![]);
        assert!(!claim.is_expired(100));
        assert!(claim.is_expired(101));
    }
}
