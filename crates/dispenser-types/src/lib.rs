//! Dispenser Types - Canonical domain types for the dispenser protocol
//!
//! This crate contains the foundational types for the dispenser with zero
//! dependencies on other dispenser crates. It defines:
//!
//! - Address types (20-byte EVM-style account/token/strategy identifiers)
//! - Pool records, ids, and lifecycle status
//! - Claim requests, splits, signatures, and replay keys
//! - Event signals emitted by the engine
//!
//! # Architectural Invariants
//!
//! These types encode the core dispenser guarantees at the type level:
//!
//! 1. Amounts are raw `u128` base units — negative balances are unrepresentable
//! 2. Pool ids are minted by the ownership registry; the core never invents one
//! 3. A claim key covers the exact signed tuple, signature included — two
//!    distinct authorizations can never collide on one replay marker

pub mod address;
pub mod claim;
pub mod events;
pub mod pool;

pub use address::*;
pub use claim::*;
pub use events::*;
pub use pool::*;
