//! Claim digest construction.
//!
//! Two schemes produce the 32-byte digest a pool signer commits to:
//!
//! - [`SignatureScheme::PackedPersonal`] — tight packing of the claim tuple,
//!   keccak-256, then the `"\x19Ethereum Signed Message:\n32"` envelope
//!   (protocol v1 wallets sign this way)
//! - [`SignatureScheme::TypedData`] — EIP-712 structured hashing under the
//!   `DispenserProvider` domain (protocol v2)
//!
//! The EIP-712 type strings keep the field names of the deployed protocol
//! (`Builder`, `simpleProvider`, `MessageStruct`, `data`). Renaming them to
//! this crate's vocabulary would change every digest and break verification
//! of signatures produced by existing clients.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use dispenser_types::{Address, ClaimKey, ClaimRequest, SignatureBytes, Split};

/// Protocol name bound into the EIP-712 domain.
pub const PROVIDER_NAME: &str = "DispenserProvider";

/// Protocol version bound into the EIP-712 domain.
pub const PROVIDER_VERSION: &str = "1";

const EIP712_DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const BUILDER_TYPE: &[u8] = b"Builder(address simpleProvider,uint256[] params)";
const MESSAGE_TYPE: &[u8] = b"MessageStruct(Builder[] data,uint256 poolId,address receiver,uint256 validUntil)Builder(address simpleProvider,uint256[] params)";

const PERSONAL_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Which digest construction a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// Tightly packed claim tuple, keccak-256, personal-message envelope.
    PackedPersonal,
    /// EIP-712 structured hashing under the `DispenserProvider` domain.
    TypedData,
}

/// EIP-712 signing domain for [`SignatureScheme::TypedData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// The standard dispenser domain on the given chain and contract address.
    pub fn dispenser(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: PROVIDER_NAME.to_string(),
            version: PROVIDER_VERSION.to_string(),
            chain_id,
            verifying_contract,
        }
    }

    /// `keccak256(typehash ‖ keccak(name) ‖ keccak(version) ‖ chainId ‖ contract)`.
    pub fn separator(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(32 * 5);
        buf.extend_from_slice(&keccak256(EIP712_DOMAIN_TYPE));
        buf.extend_from_slice(&keccak256(self.name.as_bytes()));
        buf.extend_from_slice(&keccak256(self.version.as_bytes()));
        buf.extend_from_slice(&u256_from_u64(self.chain_id));
        buf.extend_from_slice(&pad_address(&self.verifying_contract));
        keccak256(&buf)
    }
}

/// keccak-256 of `input` via the sha3 crate.
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

// ── Word encoding ─────────────────────────────────────────────────────────────

fn u256_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn u256_from_u128(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn pad_address(addr: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_bytes());
    word
}

// ── Packed scheme ─────────────────────────────────────────────────────────────

/// Canonical tight packing of the claim tuple:
/// `u256(poolId) ‖ u256(validUntil) ‖ receiver ‖ (strategy ‖ u256(param)*)*`.
///
/// Addresses pack to their raw 20 bytes; integers widen to 32-byte
/// big-endian words. This is also the preimage base of [`claim_key`].
pub fn packed_claim(claim: &ClaimRequest) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&u256_from_u64(claim.pool_id.0));
    buf.extend_from_slice(&u256_from_u64(claim.valid_until));
    buf.extend_from_slice(claim.receiver.as_bytes());
    for split in &claim.splits {
        buf.extend_from_slice(split.strategy.as_bytes());
        for &param in &split.params {
            buf.extend_from_slice(&u256_from_u128(param));
        }
    }
    buf
}

/// Digest for [`SignatureScheme::PackedPersonal`].
pub fn packed_personal_digest(claim: &ClaimRequest) -> [u8; 32] {
    let inner = keccak256(&packed_claim(claim));
    let mut buf = Vec::with_capacity(PERSONAL_PREFIX.len() + 32);
    buf.extend_from_slice(PERSONAL_PREFIX);
    buf.extend_from_slice(&inner);
    keccak256(&buf)
}

// ── Typed-data scheme ─────────────────────────────────────────────────────────

fn split_struct_hash(split: &Split) -> [u8; 32] {
    let mut params = Vec::with_capacity(split.params.len() * 32);
    for &param in &split.params {
        params.extend_from_slice(&u256_from_u128(param));
    }
    let mut buf = Vec::with_capacity(32 * 3);
    buf.extend_from_slice(&keccak256(BUILDER_TYPE));
    buf.extend_from_slice(&pad_address(&split.strategy));
    buf.extend_from_slice(&keccak256(&params));
    keccak256(&buf)
}

/// Digest for [`SignatureScheme::TypedData`] under `domain`.
pub fn typed_data_digest(domain: &Eip712Domain, claim: &ClaimRequest) -> [u8; 32] {
    let mut split_hashes = Vec::with_capacity(claim.splits.len() * 32);
    for split in &claim.splits {
        split_hashes.extend_from_slice(&split_struct_hash(split));
    }

    let mut message = Vec::with_capacity(32 * 5);
    message.extend_from_slice(&keccak256(MESSAGE_TYPE));
    message.extend_from_slice(&keccak256(&split_hashes));
    message.extend_from_slice(&u256_from_u64(claim.pool_id.0));
    message.extend_from_slice(&pad_address(&claim.receiver));
    message.extend_from_slice(&u256_from_u64(claim.valid_until));
    let struct_hash = keccak256(&message);

    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(&domain.separator());
    buf.extend_from_slice(&struct_hash);
    keccak256(&buf)
}

/// Digest a claim under the chosen scheme.
pub fn claim_digest(
    scheme: SignatureScheme,
    domain: &Eip712Domain,
    claim: &ClaimRequest,
) -> [u8; 32] {
    match scheme {
        SignatureScheme::PackedPersonal => packed_personal_digest(claim),
        SignatureScheme::TypedData => typed_data_digest(domain, claim),
    }
}

/// Permanent replay key for a signed claim: keccak-256 over the packed claim
/// tuple concatenated with the signature bytes.
pub fn claim_key(claim: &ClaimRequest, signature: &SignatureBytes) -> ClaimKey {
    let mut buf = packed_claim(claim);
    buf.extend_from_slice(signature.as_bytes());
    ClaimKey(keccak256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_types::PoolId;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn sample_claim() -> ClaimRequest {
        ClaimRequest::new(
            PoolId(7),
            1_700_000_000,
            addr(0xaa),
            vec![
                Split::new(addr(0xb1), vec![500, 1_700_000_100]),
                Split::new(addr(0xb2), vec![250]),
            ],
        )
    }

    #[test]
    fn keccak_matches_known_vector() {
        // keccak-256 of the empty string.
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn packed_layout_is_tight() {
        // u256 poolId + u256 validUntil + 20-byte receiver, then per split a
        // 20-byte strategy plus 32 bytes per param.
        let packed = packed_claim(&sample_claim());
        assert_eq!(packed.len(), 32 + 32 + 20 + (20 + 64) + (20 + 32));
    }

    #[test]
    fn every_claim_field_reaches_the_packed_digest() {
        let base = sample_claim();
        let digest = packed_personal_digest(&base);

        let mut changed = base.clone();
        changed.pool_id = PoolId(8);
        assert_ne!(packed_personal_digest(&changed), digest);

        let mut changed = base.clone();
        changed.valid_until += 1;
        assert_ne!(packed_personal_digest(&changed), digest);

        let mut changed = base.clone();
        changed.receiver = addr(0xab);
        assert_ne!(packed_personal_digest(&changed), digest);

        let mut changed = base.clone();
        changed.splits[1].params[0] += 1;
        assert_ne!(packed_personal_digest(&changed), digest);

        let mut changed = base;
        changed.splits.pop();
        assert_ne!(packed_personal_digest(&changed), digest);
    }

    #[test]
    fn personal_envelope_changes_the_digest() {
        let claim = sample_claim();
        assert_ne!(packed_personal_digest(&claim), keccak256(&packed_claim(&claim)));
    }

    #[test]
    fn typed_digest_binds_the_domain() {
        let claim = sample_claim();
        let mainnet = Eip712Domain::dispenser(1, addr(0xcc));
        let testnet = Eip712Domain::dispenser(5, addr(0xcc));
        let other_contract = Eip712Domain::dispenser(1, addr(0xcd));

        let digest = typed_data_digest(&mainnet, &claim);
        assert_ne!(typed_data_digest(&testnet, &claim), digest);
        assert_ne!(typed_data_digest(&other_contract, &claim), digest);
        assert_eq!(typed_data_digest(&mainnet, &claim), digest);
    }

    #[test]
    fn schemes_never_collide() {
        let claim = sample_claim();
        let domain = Eip712Domain::dispenser(1, addr(0xcc));
        assert_ne!(
            claim_digest(SignatureScheme::PackedPersonal, &domain, &claim),
            claim_digest(SignatureScheme::TypedData, &domain, &claim)
        );
    }

    #[test]
    fn claim_key_covers_the_signature() {
        let claim = sample_claim();
        let sig_a = SignatureBytes::new(vec![1u8; 65]);
        let sig_b = SignatureBytes::new(vec![2u8; 65]);
        assert_ne!(claim_key(&claim, &sig_a), claim_key(&claim, &sig_b));

        let mut other = claim.clone();
        other.valid_until += 1;
        assert_ne!(claim_key(&other, &sig_a), claim_key(&claim, &sig_a));
    }
}
