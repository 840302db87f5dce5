//! Dispenser Ledger - Pool state for the dispenser protocol
//!
//! The ledger is:
//! - Pool-keyed (one record per registry-minted pool id)
//! - Balance-decreasing (remaining only moves down, except for the rollback
//!   of the very reservation that moved it)
//! - Replay-guarded (consumed claim keys are kept forever)
//! - Storage-only (no custody or registry I/O — the engine drives those)
//!
//! # Invariants
//!
//! 1. No negative balances (unrepresentable: amounts are u128)
//! 2. Validation before mutation — a failed operation changes nothing
//! 3. A marker observable after a committed dispense is permanent
//! 4. Rollback restores exactly what one reservation took, nothing more

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use dispenser_types::{Address, ClaimKey, Pool, PoolId, Split};

/// Errors that can occur in pool ledger operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid signer address")]
    InvalidSigner,

    #[error("invalid token address")]
    InvalidToken,

    #[error("invalid amount")]
    InvalidAmount,

    #[error("pool already exists: {pool_id}")]
    PoolAlreadyExists { pool_id: PoolId },

    #[error("pool not found: {pool_id}")]
    PoolNotFound { pool_id: PoolId },

    #[error("claim carries no splits")]
    ZeroParamsLength,

    #[error("split amount must be greater than zero")]
    AmountMustBeGreaterThanZero,

    #[error("split amounts overflow u128")]
    AmountOverflow,

    #[error("not enough tokens in pool: requested {requested}, available {available}")]
    NotEnoughTokensInPool { requested: u128, available: u128 },

    #[error("tokens already taken for this claim")]
    TokensAlreadyTaken,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// The pool ledger
///
/// The only place pool balances and consumed-claim markers live. Thread-safe
/// and cheap to clone; all handles share the same state.
#[derive(Clone)]
pub struct PoolLedger {
    /// Pool records keyed by id
    pools: Arc<RwLock<HashMap<PoolId, Pool>>>,
    /// Claim keys of every dispense that reserved funds (permanent once committed)
    consumed: Arc<RwLock<HashSet<ClaimKey>>>,
}

impl PoolLedger {
    /// Create a new in-memory pool ledger
    pub fn new() -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
            consumed: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Register a new pool with `remaining = amount`.
    ///
    /// The id comes from the ownership registry; custody of the tokens must
    /// already be arranged by the caller. Fails without side effects if the
    /// signer or token is the zero address, the amount is zero, or the id is
    /// already taken.
    pub async fn create_pool(
        &self,
        pool_id: PoolId,
        signer: Address,
        token: Address,
        amount: u128,
    ) -> Result<Pool> {
        if signer.is_zero() {
            return Err(LedgerError::InvalidSigner);
        }
        if token.is_zero() {
            return Err(LedgerError::InvalidToken);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let mut pools = self.pools.write().await;
        if pools.contains_key(&pool_id) {
            return Err(LedgerError::PoolAlreadyExists { pool_id });
        }

        let pool = Pool::new(pool_id, signer, token, amount);
        pools.insert(pool_id, pool.clone());
        Ok(pool)
    }

    /// Snapshot of a pool record.
    pub async fn pool(&self, pool_id: PoolId) -> Option<Pool> {
        let pools = self.pools.read().await;
        pools.get(&pool_id).cloned()
    }

    /// Base units still available to dispense. 0 for unknown pools.
    pub async fn remaining(&self, pool_id: PoolId) -> u128 {
        let pools = self.pools.read().await;
        pools.get(&pool_id).map(|p| p.remaining).unwrap_or(0)
    }

    /// Number of registered pools.
    pub async fn pool_count(&self) -> usize {
        self.pools.read().await.len()
    }

    /// Validate a claim's splits against the pool and reserve their total.
    ///
    /// Checks, in order: pool exists, at least one split, every split amount
    /// strictly positive, total within u128, total within `remaining`. Only
    /// then is `remaining` decremented. Returns the total reserved.
    pub async fn reserve_and_split(&self, pool_id: PoolId, splits: &[Split]) -> Result<u128> {
        let mut pools = self.pools.write().await;
        let pool = pools
            .get_mut(&pool_id)
            .ok_or(LedgerError::PoolNotFound { pool_id })?;

        if splits.is_empty() {
            return Err(LedgerError::ZeroParamsLength);
        }

        let mut total: u128 = 0;
        for split in splits {
            let amount = split.amount();
            if amount == 0 {
                return Err(LedgerError::AmountMustBeGreaterThanZero);
            }
            total = total
                .checked_add(amount)
                .ok_or(LedgerError::AmountOverflow)?;
        }

        let remaining = pool
            .remaining
            .checked_sub(total)
            .ok_or(LedgerError::NotEnoughTokensInPool {
                requested: total,
                available: pool.remaining,
            })?;

        pool.remaining = remaining;
        Ok(total)
    }

    /// Whether a claim key has already been consumed.
    pub async fn is_consumed(&self, key: &ClaimKey) -> bool {
        let consumed = self.consumed.read().await;
        consumed.contains(key)
    }

    /// Record a claim key as consumed. Fails if it already is.
    pub async fn mark_consumed(&self, key: ClaimKey) -> Result<()> {
        let mut consumed = self.consumed.write().await;
        if !consumed.insert(key) {
            return Err(LedgerError::TokensAlreadyTaken);
        }
        Ok(())
    }

    /// Re-credit a reservation without touching markers.
    ///
    /// For failure paths that never wrote a marker of their own. Crediting
    /// back saturates rather than errors: the amount being returned was
    /// subtracted from this same pool moments ago.
    pub async fn unreserve(&self, pool_id: PoolId, amount: u128) {
        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get_mut(&pool_id) {
            pool.remaining = pool.remaining.saturating_add(amount);
        }
    }

    /// Undo one reservation: re-credit `amount` to the pool and drop the
    /// provisional marker.
    ///
    /// Only the dispense failure path calls this, for the reservation it made
    /// itself — which is why crediting back cannot overflow and the marker is
    /// known to exist. Committed markers are never passed here.
    pub async fn rollback_reservation(&self, pool_id: PoolId, amount: u128, key: &ClaimKey) {
        let mut pools = self.pools.write().await;
        let mut consumed = self.consumed.write().await;

        if let Some(pool) = pools.get_mut(&pool_id) {
            pool.remaining = pool.remaining.saturating_add(amount);
        }
        consumed.remove(key);
    }

    /// Total number of consumed claim markers.
    pub async fn consumed_count(&self) -> usize {
        self.consumed.read().await.len()
    }
}

impl Default for PoolLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_types::PoolStatus;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn split(strategy: u8, amount: u128) -> Split {
        Split::new(addr(strategy), vec![amount])
    }

    async fn ledger_with_pool(amount: u128) -> PoolLedger {
        let ledger = PoolLedger::new();
        ledger
            .create_pool(PoolId(1), addr(0x51), addr(0x70), amount)
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_create_pool_and_remaining() {
        let ledger = PoolLedger::new();
        assert_eq!(ledger.remaining(PoolId(1)).await, 0);

        let pool = ledger
            .create_pool(PoolId(1), addr(0x51), addr(0x70), 1_000)
            .await
            .unwrap();

        assert_eq!(pool.remaining, 1_000);
        assert_eq!(ledger.remaining(PoolId(1)).await, 1_000);
        assert_eq!(ledger.pool_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_pool_validation() {
        let ledger = PoolLedger::new();

        assert_eq!(
            ledger
                .create_pool(PoolId(1), Address::ZERO, addr(0x70), 1_000)
                .await,
            Err(LedgerError::InvalidSigner)
        );
        assert_eq!(
            ledger
                .create_pool(PoolId(1), addr(0x51), Address::ZERO, 1_000)
                .await,
            Err(LedgerError::InvalidToken)
        );
        assert_eq!(
            ledger.create_pool(PoolId(1), addr(0x51), addr(0x70), 0).await,
            Err(LedgerError::InvalidAmount)
        );

        // Nothing was registered along the way
        assert_eq!(ledger.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_pool_rejects_duplicate_id() {
        let ledger = ledger_with_pool(1_000).await;
        let result = ledger
            .create_pool(PoolId(1), addr(0x52), addr(0x71), 5)
            .await;
        assert_eq!(result, Err(LedgerError::PoolAlreadyExists { pool_id: PoolId(1) }));
    }

    #[tokio::test]
    async fn test_reserve_decrements_remaining() {
        let ledger = ledger_with_pool(1_000).await;

        let total = ledger
            .reserve_and_split(PoolId(1), &[split(0xa1, 300), split(0xa2, 200)])
            .await
            .unwrap();

        assert_eq!(total, 500);
        assert_eq!(ledger.remaining(PoolId(1)).await, 500);
    }

    #[tokio::test]
    async fn test_reserve_unknown_pool() {
        let ledger = PoolLedger::new();
        let result = ledger.reserve_and_split(PoolId(9), &[split(0xa1, 10)]).await;
        assert_eq!(result, Err(LedgerError::PoolNotFound { pool_id: PoolId(9) }));
    }

    #[tokio::test]
    async fn test_reserve_requires_splits() {
        let ledger = ledger_with_pool(1_000).await;
        let result = ledger.reserve_and_split(PoolId(1), &[]).await;
        assert_eq!(result, Err(LedgerError::ZeroParamsLength));
        assert_eq!(ledger.remaining(PoolId(1)).await, 1_000);
    }

    #[tokio::test]
    async fn test_reserve_rejects_zero_amount_split() {
        let ledger = ledger_with_pool(1_000).await;
        let result = ledger
            .reserve_and_split(PoolId(1), &[split(0xa1, 100), split(0xa2, 0)])
            .await;
        assert_eq!(result, Err(LedgerError::AmountMustBeGreaterThanZero));
        assert_eq!(ledger.remaining(PoolId(1)).await, 1_000);

        // A split with no params at all counts as amount 0
        let result = ledger
            .reserve_and_split(PoolId(1), &[Split::new(addr(0xa1), vec![])])
            .await;
        assert_eq!(result, Err(LedgerError::AmountMustBeGreaterThanZero));
    }

    #[tokio::test]
    async fn test_reserve_insufficient_funds_changes_nothing() {
        let ledger = ledger_with_pool(1_000).await;
        let result = ledger
            .reserve_and_split(PoolId(1), &[split(0xa1, 600), split(0xa2, 600)])
            .await;

        assert_eq!(
            result,
            Err(LedgerError::NotEnoughTokensInPool {
                requested: 1_200,
                available: 1_000,
            })
        );
        assert_eq!(ledger.remaining(PoolId(1)).await, 1_000);
    }

    #[tokio::test]
    async fn test_reserve_detects_overflow() {
        let ledger = ledger_with_pool(1_000).await;
        let result = ledger
            .reserve_and_split(PoolId(1), &[split(0xa1, u128::MAX), split(0xa2, 1)])
            .await;
        assert_eq!(result, Err(LedgerError::AmountOverflow));
        assert_eq!(ledger.remaining(PoolId(1)).await, 1_000);
    }

    #[tokio::test]
    async fn test_pool_can_be_drained_to_exactly_zero() {
        let ledger = ledger_with_pool(500).await;

        ledger
            .reserve_and_split(PoolId(1), &[split(0xa1, 500)])
            .await
            .unwrap();

        let pool = ledger.pool(PoolId(1)).await.unwrap();
        assert_eq!(pool.remaining, 0);
        assert_eq!(pool.status(), PoolStatus::Exhausted);

        let result = ledger.reserve_and_split(PoolId(1), &[split(0xa1, 1)]).await;
        assert_eq!(
            result,
            Err(LedgerError::NotEnoughTokensInPool {
                requested: 1,
                available: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_consumed_markers() {
        let ledger = PoolLedger::new();
        let key = ClaimKey([7u8; 32]);

        assert!(!ledger.is_consumed(&key).await);
        ledger.mark_consumed(key).await.unwrap();
        assert!(ledger.is_consumed(&key).await);

        let result = ledger.mark_consumed(key).await;
        assert_eq!(result, Err(LedgerError::TokensAlreadyTaken));
        assert_eq!(ledger.consumed_count().await, 1);
    }

    #[tokio::test]
    async fn test_unreserve_recredits_remaining() {
        let ledger = ledger_with_pool(1_000).await;
        ledger
            .reserve_and_split(PoolId(1), &[split(0xa1, 250)])
            .await
            .unwrap();
        assert_eq!(ledger.remaining(PoolId(1)).await, 750);

        ledger.unreserve(PoolId(1), 250).await;
        assert_eq!(ledger.remaining(PoolId(1)).await, 1_000);
    }

    #[tokio::test]
    async fn test_rollback_restores_reservation_and_marker() {
        let ledger = ledger_with_pool(1_000).await;
        let key = ClaimKey([9u8; 32]);

        let total = ledger
            .reserve_and_split(PoolId(1), &[split(0xa1, 400)])
            .await
            .unwrap();
        ledger.mark_consumed(key).await.unwrap();
        assert_eq!(ledger.remaining(PoolId(1)).await, 600);

        ledger.rollback_reservation(PoolId(1), total, &key).await;

        assert_eq!(ledger.remaining(PoolId(1)).await, 1_000);
        assert!(!ledger.is_consumed(&key).await);
    }
}
