//! Collaborator seams — the ONLY surface through which the engine touches
//! the outside world.
//!
//! The core depends on these traits, never on concrete backends. Production
//! wiring binds them to real custody/registry/strategy systems; the
//! [`memory`](crate::memory) module provides in-process implementations for
//! tests and demos.
//!
//! # The Four Seams
//!
//! 1. **[`Custody`]** — moves tokens into and out of the vault
//! 2. **[`OwnershipRegistry`]** — mints pool ids, answers approval queries
//! 3. **[`AllocationStrategy`]** — turns a reserved split into an allocation
//! 4. **[`EventSink`]** — receives engine notifications

use async_trait::async_trait;
use thiserror::Error;

use dispenser_types::{Address, DispenserEvent, PoolId};

// ── Custody ───────────────────────────────────────────────────────────────────

/// Moves tokens between external holders and the vault.
#[async_trait]
pub trait Custody: Send + Sync + 'static {
    /// Take `amount` of `token` from `from` into custody.
    async fn take(&self, token: Address, from: Address, amount: u128)
        -> Result<(), CustodyError>;

    /// Release `amount` of `token` from custody to `to`.
    async fn release(&self, token: Address, to: Address, amount: u128)
        -> Result<(), CustodyError>;
}

// ── Ownership registry ────────────────────────────────────────────────────────

/// Mints pool ids and answers ownership and delegation queries.
///
/// Ids increase monotonically and are never reused. Allocations minted by
/// strategies draw from the same sequence, which is why an allocation id is
/// a [`PoolId`].
#[async_trait]
pub trait OwnershipRegistry: Send + Sync + 'static {
    /// Mint the next pool id, owned by `owner`.
    async fn mint_pool(&self, owner: Address) -> PoolId;

    /// Current owner of a pool, if it exists.
    async fn owner_of(&self, pool_id: PoolId) -> Option<Address>;

    /// Blanket delegation: may `operator` act on behalf of every pool
    /// `owner` holds?
    async fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool;

    /// Scoped delegation: may `operator` act on this specific pool?
    async fn is_approved(&self, pool_id: PoolId, operator: Address) -> bool;
}

// ── Allocation strategies ─────────────────────────────────────────────────────

/// Creates downstream allocations for dispensed splits.
///
/// Implementations decide what an allocation means — immediate transfer,
/// cliff lock, vesting schedule. The engine only hands over the reserved
/// split and records the id that comes back.
#[async_trait]
pub trait AllocationStrategy: Send + Sync + 'static {
    /// Create an allocation of `params` for `receiver`, drawing on `pool_id`.
    /// Returns the id of the new allocation.
    async fn create_allocation(
        &self,
        pool_id: PoolId,
        receiver: Address,
        params: &[u128],
    ) -> Result<PoolId, StrategyError>;

    /// Undo an allocation created earlier in the same dispense call.
    ///
    /// When a later split fails, the engine revokes every allocation the
    /// call already created so the dispense leaves no trace. Best effort:
    /// implementations must not fail, and revoking an unknown id is a no-op.
    async fn revoke_allocation(&self, allocation_id: PoolId);
}

// ── Event sink ────────────────────────────────────────────────────────────────

/// Receives engine notifications. Purely observational — the engine never
/// depends on what a sink does with an event.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn emit(&self, event: DispenserEvent);
}

// ── Error Types ───────────────────────────────────────────────────────────────

/// Errors from the custody collaborator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustodyError {
    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u128, required: u128 },

    #[error("custody rejected the transfer: {0}")]
    Rejected(String),
}

/// Errors from an allocation strategy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error("strategy rejected the params: {0}")]
    BadParams(String),

    #[error("strategy failed: {0}")]
    Failed(String),
}
