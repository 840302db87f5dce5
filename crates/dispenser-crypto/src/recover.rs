//! Recoverable secp256k1 signatures and EVM address derivation.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint as _;
use thiserror::Error;

use dispenser_types::{Address, SignatureBytes};

use crate::digest::keccak256;

/// Errors from signature parsing and public-key recovery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature must be 65 bytes (r ‖ s ‖ v), got {len}")]
    InvalidSignatureLength { len: usize },
    #[error("could not recover a public key from the signature")]
    RecoveryFailed,
}

/// Recover the EVM address that signed `digest`.
///
/// Expects `r ‖ s ‖ v` with `v` as 0/1 or the Ethereum-conventional 27/28.
/// A structurally broken signature (bad length, invalid scalar, impossible
/// recovery id) surfaces as an error; a well-formed signature from the wrong
/// key simply recovers a different address — telling those apart is the
/// caller's job.
pub fn recover_address(
    digest: &[u8; 32],
    signature: &SignatureBytes,
) -> Result<Address, SignatureError> {
    let bytes = signature.as_bytes();
    if bytes.len() != 65 {
        return Err(SignatureError::InvalidSignatureLength { len: bytes.len() });
    }

    let sig =
        Signature::from_slice(&bytes[..64]).map_err(|_| SignatureError::RecoveryFailed)?;
    let v = bytes[64];
    let rid = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v })
        .ok_or(SignatureError::RecoveryFailed)?;

    let key = VerifyingKey::recover_from_prehash(digest, &sig, rid)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(address_of_key(&key))
}

/// EVM address of a secp256k1 public key.
///
/// Algorithm: `keccak256(uncompressed_point[1..])[12..]` — hash the 64-byte
/// point without its 0x04 prefix, keep the last 20 bytes.
pub fn address_of_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false); // uncompressed
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Address(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn key_from_scalar(scalar: u8) -> SigningKey {
        let mut bytes = [0u8; 32];
        bytes[31] = scalar;
        SigningKey::from_bytes((&bytes).into()).unwrap()
    }

    #[test]
    fn address_of_key_matches_known_vector() {
        // The address of secp256k1 private key 0x...01.
        let key = key_from_scalar(1);
        assert_eq!(
            address_of_key(key.verifying_key()),
            Address::parse("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf").unwrap()
        );
    }

    #[test]
    fn recovers_the_signing_address() {
        let key = key_from_scalar(42);
        let digest = keccak256(b"claim digest");

        let (sig, rid) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(rid.to_byte() + 27);

        let recovered = recover_address(&digest, &SignatureBytes::new(bytes)).unwrap();
        assert_eq!(recovered, address_of_key(key.verifying_key()));
    }

    #[test]
    fn accepts_raw_recovery_id_without_27_offset() {
        let key = key_from_scalar(42);
        let digest = keccak256(b"claim digest");

        let (sig, rid) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(rid.to_byte());

        let recovered = recover_address(&digest, &SignatureBytes::new(bytes)).unwrap();
        assert_eq!(recovered, address_of_key(key.verifying_key()));
    }

    #[test]
    fn wrong_digest_recovers_a_different_address() {
        let key = key_from_scalar(42);
        let digest = keccak256(b"claim digest");
        let other = keccak256(b"another digest");

        let (sig, rid) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(rid.to_byte() + 27);

        match recover_address(&other, &SignatureBytes::new(bytes)) {
            Ok(addr) => assert_ne!(addr, address_of_key(key.verifying_key())),
            Err(SignatureError::RecoveryFailed) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn rejects_wrong_length() {
        let digest = [0u8; 32];
        let err = recover_address(&digest, &SignatureBytes::new(vec![0u8; 64])).unwrap_err();
        assert_eq!(err, SignatureError::InvalidSignatureLength { len: 64 });
    }

    #[test]
    fn rejects_impossible_recovery_id() {
        let key = key_from_scalar(42);
        let digest = keccak256(b"claim digest");

        let (sig, _) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(9); // not 0/1 and not 27/28
        // 9 is below 27, so it is taken as a raw recovery id and fails.
        let err = recover_address(&digest, &SignatureBytes::new(bytes)).unwrap_err();
        assert_eq!(err, SignatureError::RecoveryFailed);
    }
}
