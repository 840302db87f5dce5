//! Dispense orchestration over signed claims.
//!
//! This crate drives the whole claim lifecycle: pools are funded through
//! [`DispenserEngine::create_pool`], and signed claims are settled through
//! [`DispenserEngine::dispense`], which verifies, reserves, and hands each
//! split to its allocation strategy.
//!
//! # Architecture
//!
//! A dispense runs a fixed pipeline:
//!
//! 1. expiry check against wall-clock time
//! 2. pool lookup
//! 3. digest construction and secp256k1 recovery
//! 4. recovered address must equal the pool's signer
//! 5. replay check against the consumed-marker set
//! 6. caller authorization (receiver, operator, pool approval, or signer)
//! 7. reservation: total split amount debited from the pool
//! 8. consumed marker written
//! 9. per-split dispatch to the registered strategy
//!
//! Steps 7–9 behave as one transaction: if any split fails to allocate,
//! the allocations already created by this call are revoked, the
//! reservation is rolled back, and the marker is dropped.
//!
//! # Components
//!
//! - [`DispenserEngine`] — the orchestrator, generic over its collaborators
//! - [`Custody`], [`OwnershipRegistry`], [`AllocationStrategy`], [`EventSink`]
//!   — the four collaborator seams
//! - [`StrategyGateway`] — address-to-strategy routing table
//! - [`memory`] — in-memory collaborators for tests and local runs
//!
//! # Example
//!
//! ```ignore
//! let engine = DispenserEngine::new(EngineConfig::default(), ledger, vault, registry, events);
//! engine.register_strategy(lock_addr, lock_strategy).await;
//! let pool_id = engine.create_pool(funder, signer.address(), token, amount, proof).await?;
//! let signature = signer.sign_claim(engine.config().scheme, engine.domain(), &claim);
//! let receipt = engine.dispense(caller, &claim, &signature).await?;
//! ```

pub mod engine;
pub mod gateway;
pub mod memory;
pub mod policy;
pub mod traits;

pub use engine::{
    Allocation, DispenseReceipt, DispenserEngine, DispenserError, DispenserResult, EngineConfig,
};
pub use gateway::StrategyGateway;
pub use policy::{authorize, Admission};
pub use traits::{
    AllocationStrategy, Custody, CustodyError, EventSink, OwnershipRegistry, StrategyError,
};

pub use dispenser_crypto::{ClaimSigner, Eip712Domain, SignatureScheme};
pub use dispenser_types::{
    Address, ClaimRequest, DispenserEvent, Pool, PoolId, SignatureBytes, Split,
};
