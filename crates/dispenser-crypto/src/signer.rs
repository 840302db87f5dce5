//! Claim signing for clients, demos, and tests.
//!
//! The engine never signs anything — it only verifies. [`ClaimSigner`] is
//! the client-side counterpart: it holds a secp256k1 key and produces the
//! 65-byte recoverable signatures the verifier accepts, under either digest
//! scheme. Deterministic label-derived signers keep tests reproducible.

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;

use dispenser_types::{Address, ClaimRequest, SignatureBytes};

use crate::digest::{claim_digest, Eip712Domain, SignatureScheme};
use crate::recover::address_of_key;

/// Produces recoverable claim signatures. Never exports key material.
#[derive(Clone)]
pub struct ClaimSigner {
    key: SigningKey,
    address: Address,
}

impl ClaimSigner {
    /// Random signer from OS entropy.
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Deterministic signer derived from a human-readable label.
    pub fn for_label(label: &str) -> Self {
        // A derived seed at or above the curve order is not a valid scalar
        // (odds ~2^-128); extend the key material and derive again.
        let mut material = label.as_bytes().to_vec();
        loop {
            let seed = blake3::derive_key("dispenser claim signer seed v1", &material);
            if let Ok(key) = SigningKey::from_bytes((&seed).into()) {
                return Self::from_signing_key(key);
            }
            material.push(0);
        }
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        let address = address_of_key(key.verifying_key());
        Self { key, address }
    }

    /// The EVM address signatures from this signer recover to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a prehashed 32-byte digest. Returns `r ‖ s ‖ v` with `v ∈ {27, 28}`.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> SignatureBytes {
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest)
            .expect("prehash signing cannot fail for a valid key");
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte() + 27; // Ethereum v encoding
        SignatureBytes::new(out.to_vec())
    }

    /// Sign a claim under the chosen scheme and domain.
    pub fn sign_claim(
        &self,
        scheme: SignatureScheme,
        domain: &Eip712Domain,
        claim: &ClaimRequest,
    ) -> SignatureBytes {
        self.sign_digest(&claim_digest(scheme, domain, claim))
    }
}

impl std::fmt::Debug for ClaimSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recover::recover_address;
    use dispenser_types::{PoolId, Split};

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn sample_claim() -> ClaimRequest {
        ClaimRequest::new(
            PoolId(3),
            2_000_000_000,
            addr(0x11),
            vec![Split::new(addr(0x22), vec![1_000])],
        )
    }

    #[test]
    fn label_derivation_is_deterministic() {
        let a = ClaimSigner::for_label("pool signer");
        let b = ClaimSigner::for_label("pool signer");
        let c = ClaimSigner::for_label("someone else");
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn every_label_yields_a_signer() {
        // Arbitrary labels, including empty and non-ASCII, always produce a
        // usable key instead of panicking.
        for label in ["", "a", "Ω pool Ω", "\u{1F512}"] {
            let signer = ClaimSigner::for_label(label);
            assert!(!signer.address().is_zero());
        }
        for i in 0..64 {
            ClaimSigner::for_label(&format!("label {i}"));
        }
    }

    #[test]
    fn packed_signature_recovers_to_signer() {
        let signer = ClaimSigner::for_label("packed");
        let claim = sample_claim();
        let domain = Eip712Domain::dispenser(1, addr(0xcc));

        let sig = signer.sign_claim(SignatureScheme::PackedPersonal, &domain, &claim);
        let digest = claim_digest(SignatureScheme::PackedPersonal, &domain, &claim);
        assert_eq!(recover_address(&digest, &sig).unwrap(), signer.address());
    }

    #[test]
    fn typed_signature_recovers_to_signer() {
        let signer = ClaimSigner::for_label("typed");
        let claim = sample_claim();
        let domain = Eip712Domain::dispenser(1, addr(0xcc));

        let sig = signer.sign_claim(SignatureScheme::TypedData, &domain, &claim);
        let digest = claim_digest(SignatureScheme::TypedData, &domain, &claim);
        assert_eq!(recover_address(&digest, &sig).unwrap(), signer.address());
    }

    #[test]
    fn both_schemes_recover_the_same_address() {
        let signer = ClaimSigner::for_label("cross scheme");
        let claim = sample_claim();
        let domain = Eip712Domain::dispenser(1, addr(0xcc));

        for scheme in [SignatureScheme::PackedPersonal, SignatureScheme::TypedData] {
            let sig = signer.sign_claim(scheme, &domain, &claim);
            let digest = claim_digest(scheme, &domain, &claim);
            assert_eq!(recover_address(&digest, &sig).unwrap(), signer.address());
        }
    }

    #[test]
    fn v_byte_uses_ethereum_offset() {
        let signer = ClaimSigner::for_label("v byte");
        let sig = signer.sign_digest(&[0x5a; 32]);
        let v = *sig.as_bytes().last().unwrap();
        assert!(v == 27 || v == 28);
    }
}
