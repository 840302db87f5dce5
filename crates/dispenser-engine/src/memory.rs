//! In-memory collaborators for tests and demos.
//!
//! Everything the engine needs to run without external systems: a token
//! vault, an ownership registry, three allocation strategies with different
//! settlement shapes, a strategy that always fails, and a capturing event
//! sink. Each carries just enough behavior to exercise every engine path.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dispenser_ledger::PoolLedger;
use dispenser_types::{Address, DispenserEvent, PoolId};

use crate::traits::{
    AllocationStrategy, Custody, CustodyError, EventSink, OwnershipRegistry, StrategyError,
};

// ── Vault ─────────────────────────────────────────────────────────────────────

/// Token vault: per-holder balances plus the totals taken into custody.
///
/// `mint` funds accounts out of thin air, which is exactly what a test
/// fixture wants and exactly what production custody must never do.
#[derive(Default)]
pub struct MemoryVault {
    /// (token, holder) -> balance
    balances: RwLock<HashMap<(Address, Address), u128>>,
    /// token -> amount held in custody
    held: RwLock<HashMap<Address, u128>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `holder`.
    pub async fn mint(&self, token: Address, holder: Address, amount: u128) {
        let mut balances = self.balances.write().await;
        *balances.entry((token, holder)).or_insert(0) += amount;
    }

    pub async fn balance_of(&self, token: Address, holder: Address) -> u128 {
        let balances = self.balances.read().await;
        balances.get(&(token, holder)).copied().unwrap_or(0)
    }

    /// Amount of `token` currently in custody.
    pub async fn held(&self, token: Address) -> u128 {
        let held = self.held.read().await;
        held.get(&token).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Custody for MemoryVault {
    async fn take(
        &self,
        token: Address,
        from: Address,
        amount: u128,
    ) -> Result<(), CustodyError> {
        let mut balances = self.balances.write().await;
        let mut held = self.held.write().await;

        let balance = balances.entry((token, from)).or_insert(0);
        if *balance < amount {
            return Err(CustodyError::InsufficientFunds {
                available: *balance,
                required: amount,
            });
        }
        *balance -= amount;
        *held.entry(token).or_insert(0) += amount;
        Ok(())
    }

    async fn release(
        &self,
        token: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), CustodyError> {
        let mut balances = self.balances.write().await;
        let mut held = self.held.write().await;

        let in_custody = held.entry(token).or_insert(0);
        if *in_custody < amount {
            return Err(CustodyError::InsufficientFunds {
                available: *in_custody,
                required: amount,
            });
        }
        *in_custody -= amount;
        *balances.entry((token, to)).or_insert(0) += amount;
        Ok(())
    }
}

// ── Ownership registry ────────────────────────────────────────────────────────

/// Ownership registry: monotonic pool ids, owners, and both delegation kinds.
#[derive(Default)]
pub struct MemoryRegistry {
    next_id: AtomicU64,
    owners: RwLock<HashMap<PoolId, Address>>,
    /// (owner, operator) pairs with blanket approval
    operator_approvals: RwLock<HashSet<(Address, Address)>>,
    /// pool -> the single approved operator
    pool_approvals: RwLock<HashMap<PoolId, Address>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or revoke blanket delegation from `owner` to `operator`.
    pub async fn set_approval_for_all(&self, owner: Address, operator: Address, approved: bool) {
        let mut approvals = self.operator_approvals.write().await;
        if approved {
            approvals.insert((owner, operator));
        } else {
            approvals.remove(&(owner, operator));
        }
    }

    /// Scoped delegation for one pool.
    pub async fn approve(&self, pool_id: PoolId, operator: Address) {
        let mut approvals = self.pool_approvals.write().await;
        approvals.insert(pool_id, operator);
    }

    /// Drop a pool record (strategies use this when revoking allocations).
    pub async fn burn(&self, pool_id: PoolId) {
        self.owners.write().await.remove(&pool_id);
        self.pool_approvals.write().await.remove(&pool_id);
    }

    /// Number of live (minted and not burned) records.
    pub async fn live_count(&self) -> usize {
        self.owners.read().await.len()
    }
}

#[async_trait]
impl OwnershipRegistry for MemoryRegistry {
    async fn mint_pool(&self, owner: Address) -> PoolId {
        let id = PoolId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.owners.write().await.insert(id, owner);
        id
    }

    async fn owner_of(&self, pool_id: PoolId) -> Option<Address> {
        self.owners.read().await.get(&pool_id).copied()
    }

    async fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.operator_approvals
            .read()
            .await
            .contains(&(owner, operator))
    }

    async fn is_approved(&self, pool_id: PoolId, operator: Address) -> bool {
        self.pool_approvals.read().await.get(&pool_id) == Some(&operator)
    }
}

// ── Deal strategy ─────────────────────────────────────────────────────────────

/// Immediate settlement: mints the allocation to the receiver and releases
/// the tokens from custody on the spot. Params: `[amount]`.
pub struct DealStrategy {
    ledger: PoolLedger,
    vault: Arc<MemoryVault>,
    registry: Arc<MemoryRegistry>,
    /// allocation -> (token, receiver, amount), kept for revocation
    settled: RwLock<HashMap<PoolId, (Address, Address, u128)>>,
}

impl DealStrategy {
    pub fn new(ledger: PoolLedger, vault: Arc<MemoryVault>, registry: Arc<MemoryRegistry>) -> Self {
        Self {
            ledger,
            vault,
            registry,
            settled: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AllocationStrategy for DealStrategy {
    async fn create_allocation(
        &self,
        pool_id: PoolId,
        receiver: Address,
        params: &[u128],
    ) -> Result<PoolId, StrategyError> {
        if params.len() != 1 {
            return Err(StrategyError::BadParams(
                "deal takes exactly [amount]".to_string(),
            ));
        }
        let amount = params[0];

        let token = self
            .ledger
            .pool(pool_id)
            .await
            .map(|pool| pool.token)
            .ok_or_else(|| StrategyError::Failed(format!("no pool record for {pool_id}")))?;

        let allocation_id = self.registry.mint_pool(receiver).await;
        self.vault
            .release(token, receiver, amount)
            .await
            .map_err(|err| StrategyError::Failed(err.to_string()))?;

        let mut settled = self.settled.write().await;
        settled.insert(allocation_id, (token, receiver, amount));
        Ok(allocation_id)
    }

    async fn revoke_allocation(&self, allocation_id: PoolId) {
        let record = self.settled.write().await.remove(&allocation_id);
        if let Some((token, receiver, amount)) = record {
            // Claw the released tokens back into custody.
            let _ = self.vault.take(token, receiver, amount).await;
            self.registry.burn(allocation_id).await;
        }
    }
}

// ── Lock strategy ─────────────────────────────────────────────────────────────

/// A locked allocation waiting for its cliff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedAllocation {
    pub receiver: Address,
    pub amount: u128,
    pub unlock_at: u64,
}

/// Cliff unlock: records `[amount, unlock_at]`; funds stay in custody.
pub struct LockStrategy {
    registry: Arc<MemoryRegistry>,
    allocations: RwLock<HashMap<PoolId, LockedAllocation>>,
}

impl LockStrategy {
    pub fn new(registry: Arc<MemoryRegistry>) -> Self {
        Self {
            registry,
            allocations: RwLock::new(HashMap::new()),
        }
    }

    pub async fn allocation(&self, allocation_id: PoolId) -> Option<LockedAllocation> {
        self.allocations.read().await.get(&allocation_id).copied()
    }

    pub async fn allocation_count(&self) -> usize {
        self.allocations.read().await.len()
    }
}

#[async_trait]
impl AllocationStrategy for LockStrategy {
    async fn create_allocation(
        &self,
        _pool_id: PoolId,
        receiver: Address,
        params: &[u128],
    ) -> Result<PoolId, StrategyError> {
        if params.len() != 2 {
            return Err(StrategyError::BadParams(
                "lock takes exactly [amount, unlock_at]".to_string(),
            ));
        }
        let unlock_at = u64::try_from(params[1])
            .map_err(|_| StrategyError::BadParams("unlock time out of range".to_string()))?;

        let allocation_id = self.registry.mint_pool(receiver).await;
        let mut allocations = self.allocations.write().await;
        allocations.insert(
            allocation_id,
            LockedAllocation {
                receiver,
                amount: params[0],
                unlock_at,
            },
        );
        Ok(allocation_id)
    }

    async fn revoke_allocation(&self, allocation_id: PoolId) {
        if self.allocations.write().await.remove(&allocation_id).is_some() {
            self.registry.burn(allocation_id).await;
        }
    }
}

// ── Timed strategy ────────────────────────────────────────────────────────────

/// A linearly vesting allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VestingAllocation {
    pub receiver: Address,
    pub amount: u128,
    pub start: u64,
    pub finish: u64,
}

impl VestingAllocation {
    /// Amount vested at `now`: nothing before `start`, everything from
    /// `finish` on, linear in between.
    pub fn vested_at(&self, now: u64) -> u128 {
        if now <= self.start {
            return 0;
        }
        if now >= self.finish {
            return self.amount;
        }
        let window = (self.finish - self.start) as u128;
        let elapsed = (now - self.start) as u128;
        self.amount * elapsed / window
    }
}

/// Linear vesting: records `[amount, start, finish]`; funds stay in custody.
pub struct TimedStrategy {
    registry: Arc<MemoryRegistry>,
    allocations: RwLock<HashMap<PoolId, VestingAllocation>>,
}

impl TimedStrategy {
    pub fn new(registry: Arc<MemoryRegistry>) -> Self {
        Self {
            registry,
            allocations: RwLock::new(HashMap::new()),
        }
    }

    pub async fn allocation(&self, allocation_id: PoolId) -> Option<VestingAllocation> {
        self.allocations.read().await.get(&allocation_id).copied()
    }
}

#[async_trait]
impl AllocationStrategy for TimedStrategy {
    async fn create_allocation(
        &self,
        _pool_id: PoolId,
        receiver: Address,
        params: &[u128],
    ) -> Result<PoolId, StrategyError> {
        if params.len() != 3 {
            return Err(StrategyError::BadParams(
                "timed takes exactly [amount, start, finish]".to_string(),
            ));
        }
        let start = u64::try_from(params[1])
            .map_err(|_| StrategyError::BadParams("start time out of range".to_string()))?;
        let finish = u64::try_from(params[2])
            .map_err(|_| StrategyError::BadParams("finish time out of range".to_string()))?;
        if finish <= start {
            return Err(StrategyError::BadParams(
                "vesting window is empty".to_string(),
            ));
        }

        let allocation_id = self.registry.mint_pool(receiver).await;
        let mut allocations = self.allocations.write().await;
        allocations.insert(
            allocation_id,
            VestingAllocation {
                receiver,
                amount: params[0],
                start,
                finish,
            },
        );
        Ok(allocation_id)
    }

    async fn revoke_allocation(&self, allocation_id: PoolId) {
        if self.allocations.write().await.remove(&allocation_id).is_some() {
            self.registry.burn(allocation_id).await;
        }
    }
}

// ── Failing strategy ──────────────────────────────────────────────────────────

/// Always refuses. Lets tests drive the engine's rollback path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStrategy;

#[async_trait]
impl AllocationStrategy for FailingStrategy {
    async fn create_allocation(
        &self,
        _pool_id: PoolId,
        _receiver: Address,
        _params: &[u128],
    ) -> Result<PoolId, StrategyError> {
        Err(StrategyError::Failed("strategy permanently offline".to_string()))
    }

    async fn revoke_allocation(&self, _allocation_id: PoolId) {}
}

// ── Event sink ────────────────────────────────────────────────────────────────

/// Capturing event sink.
#[derive(Default)]
pub struct MemoryEvents {
    events: RwLock<Vec<DispenserEvent>>,
}

impl MemoryEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<DispenserEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventSink for MemoryEvents {
    async fn emit(&self, event: DispenserEvent) {
        self.events.write().await.push(event);
    }
}
