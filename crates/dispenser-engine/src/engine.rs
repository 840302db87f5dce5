//! The dispenser engine — pool creation and dispense orchestration.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use dispenser_crypto::{
    claim_digest, claim_key, recover_address, Eip712Domain, SignatureError, SignatureScheme,
    PROVIDER_NAME,
};
use dispenser_ledger::{LedgerError, PoolLedger};
use dispenser_types::{
    Address, ClaimKey, ClaimRequest, DispenserEvent, Pool, PoolId, SignatureBytes,
};

use crate::gateway::StrategyGateway;
use crate::policy;
use crate::traits::{
    AllocationStrategy, Custody, CustodyError, EventSink, OwnershipRegistry, StrategyError,
};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Digest scheme claims must be signed under
    pub scheme: SignatureScheme,
    /// Chain id bound into the typed-data domain
    pub chain_id: u64,
    /// Contract address bound into the typed-data domain
    pub verifying_contract: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheme: SignatureScheme::TypedData,
            chain_id: 1,
            verifying_contract: Address::ZERO,
        }
    }
}

/// Engine errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispenserError {
    #[error("signature expired: valid until {valid_until}, now {now}")]
    SignatureExpired { valid_until: u64, now: u64 },

    #[error("invalid signer: pool expects {expected}, signature recovers {recovered}")]
    InvalidSigner {
        expected: Address,
        recovered: Address,
    },

    #[error("caller is not approved: {caller} cannot claim for {receiver}")]
    CallerNotApproved { caller: Address, receiver: Address },

    #[error("unknown strategy: {strategy}")]
    UnknownStrategy { strategy: Address },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
}

/// Result type for engine operations
pub type DispenserResult<T> = Result<T, DispenserError>;

/// One allocation created by a dispense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub allocation_id: PoolId,
    pub strategy: Address,
    pub amount: u128,
}

/// What a successful dispense did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseReceipt {
    pub pool_id: PoolId,
    pub receiver: Address,
    /// Total base units that left the pool
    pub dispensed: u128,
    /// Remaining in the pool after this dispense
    pub remaining: u128,
    /// One entry per split, in claim order
    pub allocations: Vec<Allocation>,
}

/// The dispenser engine.
///
/// Owns the verification pipeline and drives the collaborators; the ledger
/// is the only state it mutates directly. One engine instance serializes
/// its mutating operations, so a dispense observes either all of another
/// dispense's effects or none of them.
pub struct DispenserEngine {
    config: EngineConfig,
    domain: Eip712Domain,
    ledger: PoolLedger,
    custody: Arc<dyn Custody>,
    registry: Arc<dyn OwnershipRegistry>,
    gateway: StrategyGateway,
    events: Arc<dyn EventSink>,
    /// Serializes create_pool/dispense, held across strategy dispatch
    write_gate: Mutex<()>,
}

impl DispenserEngine {
    pub fn new(
        config: EngineConfig,
        ledger: PoolLedger,
        custody: Arc<dyn Custody>,
        registry: Arc<dyn OwnershipRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let domain = Eip712Domain::dispenser(config.chain_id, config.verifying_contract);
        Self {
            config,
            domain,
            ledger,
            custody,
            registry,
            gateway: StrategyGateway::new(),
            events,
            write_gate: Mutex::new(()),
        }
    }

    /// Protocol name, as bound into the typed-data domain.
    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The typed-data domain this engine verifies against.
    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    /// Read handle to the pool ledger.
    pub fn ledger(&self) -> &PoolLedger {
        &self.ledger
    }

    /// Bind a strategy implementation to its address.
    pub async fn register_strategy(
        &self,
        address: Address,
        strategy: Arc<dyn AllocationStrategy>,
    ) {
        self.gateway.register(address, strategy).await;
    }

    /// Base units still available in a pool. 0 for unknown pools.
    pub async fn remaining(&self, pool_id: PoolId) -> u128 {
        self.ledger.remaining(pool_id).await
    }

    /// Snapshot of a pool record.
    pub async fn pool(&self, pool_id: PoolId) -> Option<Pool> {
        self.ledger.pool(pool_id).await
    }

    /// Create a pool: take custody of `amount` of `token` from `caller`,
    /// mint a pool id owned by `signer`, register the pool.
    ///
    /// `creation_proof` travels with protocol create calls; it is surfaced
    /// in the log but not checked against anything.
    pub async fn create_pool(
        &self,
        caller: Address,
        signer: Address,
        token: Address,
        amount: u128,
        creation_proof: &[u8],
    ) -> DispenserResult<PoolId> {
        let _gate = self.write_gate.lock().await;

        // Validate before any collaborator side effect.
        if signer.is_zero() {
            return Err(LedgerError::InvalidSigner.into());
        }
        if token.is_zero() {
            return Err(LedgerError::InvalidToken.into());
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount.into());
        }

        self.custody.take(token, caller, amount).await?;
        let pool_id = self.registry.mint_pool(signer).await;

        if let Err(err) = self.ledger.create_pool(pool_id, signer, token, amount).await {
            // Return the deposit; the minted id is abandoned.
            let _ = self.custody.release(token, caller, amount).await;
            warn!(pool_id = pool_id.value(), error = %err, "pool registration failed, deposit returned");
            return Err(err.into());
        }

        info!(
            pool_id = pool_id.value(),
            signer = %signer,
            token = %token,
            amount,
            proof_len = creation_proof.len(),
            "pool created"
        );
        self.events
            .emit(DispenserEvent::PoolDeposited {
                pool_id,
                signer,
                token,
                amount,
                timestamp: Utc::now(),
            })
            .await;

        Ok(pool_id)
    }

    /// Dispense a signed claim.
    ///
    /// The pipeline, in order: expiry, pool lookup, signature recovery,
    /// signer identity, replay check, caller authorization, reservation,
    /// consumed marker, strategy dispatch, signals. Reservation through
    /// dispatch is one transaction — a failing split revokes the call's
    /// allocations and restores the ledger before the error surfaces.
    pub async fn dispense(
        &self,
        caller: Address,
        claim: &ClaimRequest,
        signature: &SignatureBytes,
    ) -> DispenserResult<DispenseReceipt> {
        let _gate = self.write_gate.lock().await;

        let now = Utc::now().timestamp().max(0) as u64;
        if claim.is_expired(now) {
            return Err(DispenserError::SignatureExpired {
                valid_until: claim.valid_until,
                now,
            });
        }

        let pool = self
            .ledger
            .pool(claim.pool_id)
            .await
            .ok_or(LedgerError::PoolNotFound {
                pool_id: claim.pool_id,
            })?;

        let digest = claim_digest(self.config.scheme, &self.domain, claim);
        let recovered = recover_address(&digest, signature)?;
        if recovered != pool.signer {
            return Err(DispenserError::InvalidSigner {
                expected: pool.signer,
                recovered,
            });
        }

        let key = claim_key(claim, signature);
        if self.ledger.is_consumed(&key).await {
            return Err(LedgerError::TokensAlreadyTaken.into());
        }

        let admission = policy::authorize(
            self.registry.as_ref(),
            caller,
            claim.receiver,
            claim.pool_id,
            pool.signer,
        )
        .await
        .ok_or(DispenserError::CallerNotApproved {
            caller,
            receiver: claim.receiver,
        })?;

        let dispensed = self
            .ledger
            .reserve_and_split(claim.pool_id, &claim.splits)
            .await?;

        if let Err(err) = self.ledger.mark_consumed(key).await {
            // Unreachable while the write gate serializes dispense; restore anyway.
            self.ledger.unreserve(claim.pool_id, dispensed).await;
            return Err(err.into());
        }

        let mut allocations: Vec<Allocation> = Vec::with_capacity(claim.splits.len());
        for split in &claim.splits {
            let strategy = match self.gateway.resolve(split.strategy).await {
                Some(strategy) => strategy,
                None => {
                    self.abort_dispense(claim, dispensed, &key, &allocations).await;
                    return Err(DispenserError::UnknownStrategy {
                        strategy: split.strategy,
                    });
                }
            };
            match strategy
                .create_allocation(claim.pool_id, claim.receiver, &split.params)
                .await
            {
                Ok(allocation_id) => allocations.push(Allocation {
                    allocation_id,
                    strategy: split.strategy,
                    amount: split.amount(),
                }),
                Err(err) => {
                    self.abort_dispense(claim, dispensed, &key, &allocations).await;
                    return Err(err.into());
                }
            }
        }

        let remaining = self.ledger.remaining(claim.pool_id).await;
        info!(
            pool_id = claim.pool_id.value(),
            caller = %caller,
            receiver = %claim.receiver,
            dispensed,
            remaining,
            admission = ?admission,
            splits = allocations.len(),
            "tokens dispensed"
        );

        let timestamp = Utc::now();
        self.events
            .emit(DispenserEvent::TokensDispensed {
                pool_id: claim.pool_id,
                receiver: claim.receiver,
                dispensed,
                remaining,
                timestamp,
            })
            .await;
        for allocation in &allocations {
            self.events
                .emit(DispenserEvent::PoolCreated {
                    allocation_id: allocation.allocation_id,
                    strategy: allocation.strategy,
                    timestamp,
                })
                .await;
        }

        Ok(DispenseReceipt {
            pool_id: claim.pool_id,
            receiver: claim.receiver,
            dispensed,
            remaining,
            allocations,
        })
    }

    /// Failure path for the dispatch phase: revoke what the call created,
    /// restore the reservation, drop the provisional marker.
    async fn abort_dispense(
        &self,
        claim: &ClaimRequest,
        dispensed: u128,
        key: &ClaimKey,
        allocations: &[Allocation],
    ) {
        for allocation in allocations.iter().rev() {
            if let Some(strategy) = self.gateway.resolve(allocation.strategy).await {
                strategy.revoke_allocation(allocation.allocation_id).await;
            }
        }
        self.ledger
            .rollback_reservation(claim.pool_id, dispensed, key)
            .await;
        warn!(
            pool_id = claim.pool_id.value(),
            receiver = %claim.receiver,
            revoked = allocations.len(),
            "dispense aborted, reservation rolled back"
        );
    }
}
