//! Signature verification for the dispenser protocol.
//!
//! Everything needed to go from a [`ClaimRequest`](dispenser_types::ClaimRequest)
//! plus 65 signature bytes to the EVM address that authorized it:
//!
//! - [`digest`] — the two digest schemes (tight packing + personal-message
//!   envelope, and EIP-712 typed data) and the canonical replay key
//! - [`recover`] — signature parsing, public-key recovery, address derivation
//! - [`signer`] — [`ClaimSigner`], the client-side counterpart that produces
//!   signatures the verifier accepts (tests and demos lean on it)
//!
//! # Invariant
//!
//! Digest construction is a pure function of the claim (and, for typed data,
//! the domain). No engine state leaks into it, so any off-process client can
//! reproduce the digest byte for byte and sign offline.

pub mod digest;
pub mod recover;
pub mod signer;

pub use digest::{
    claim_digest, claim_key, keccak256, packed_claim, packed_personal_digest, typed_data_digest,
    Eip712Domain, SignatureScheme, PROVIDER_NAME, PROVIDER_VERSION,
};
pub use recover::{address_of_key, recover_address, SignatureError};
pub use signer::ClaimSigner;
