//! Caller authorization for dispense.
//!
//! A claim names a receiver; the account submitting it may be someone else
//! (a relayer, the pool's own signer). The policy decides who is allowed to
//! push a claim through, in a fixed order — first match admits.

use dispenser_types::{Address, PoolId};

use crate::traits::OwnershipRegistry;

/// Why a caller was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Caller is the receiver (self-service).
    Receiver,
    /// Receiver granted the caller blanket delegation in the registry.
    BlanketApproval,
    /// The caller holds a scoped approval for this specific pool.
    ScopedApproval,
    /// Caller is the pool's signer — the address that authorized the claim.
    PoolSigner,
}

/// Evaluate the admission rules in order. `None` means not approved.
pub async fn authorize(
    registry: &dyn OwnershipRegistry,
    caller: Address,
    receiver: Address,
    pool_id: PoolId,
    pool_signer: Address,
) -> Option<Admission> {
    if caller == receiver {
        return Some(Admission::Receiver);
    }
    if registry.is_approved_for_all(receiver, caller).await {
        return Some(Admission::BlanketApproval);
    }
    if registry.is_approved(pool_id, caller).await {
        return Some(Admission::ScopedApproval);
    }
    if caller == pool_signer {
        return Some(Admission::PoolSigner);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[tokio::test]
    async fn receiver_is_always_admitted() {
        let registry = MemoryRegistry::new();
        let user = addr(1);
        let admission = authorize(&registry, user, user, PoolId(1), addr(9)).await;
        assert_eq!(admission, Some(Admission::Receiver));
    }

    #[tokio::test]
    async fn blanket_approval_admits_an_operator() {
        let registry = MemoryRegistry::new();
        let (receiver, operator) = (addr(1), addr(2));
        registry.set_approval_for_all(receiver, operator, true).await;

        let admission = authorize(&registry, operator, receiver, PoolId(1), addr(9)).await;
        assert_eq!(admission, Some(Admission::BlanketApproval));

        registry.set_approval_for_all(receiver, operator, false).await;
        let admission = authorize(&registry, operator, receiver, PoolId(1), addr(9)).await;
        assert_eq!(admission, None);
    }

    #[tokio::test]
    async fn scoped_approval_admits_for_that_pool_only() {
        let registry = MemoryRegistry::new();
        let (receiver, operator) = (addr(1), addr(2));
        registry.approve(PoolId(5), operator).await;

        let on_pool = authorize(&registry, operator, receiver, PoolId(5), addr(9)).await;
        assert_eq!(on_pool, Some(Admission::ScopedApproval));

        let off_pool = authorize(&registry, operator, receiver, PoolId(6), addr(9)).await;
        assert_eq!(off_pool, None);
    }

    #[tokio::test]
    async fn pool_signer_is_admitted_last() {
        let registry = MemoryRegistry::new();
        let (receiver, signer) = (addr(1), addr(9));

        let admission = authorize(&registry, signer, receiver, PoolId(1), signer).await;
        assert_eq!(admission, Some(Admission::PoolSigner));
    }

    #[tokio::test]
    async fn unrelated_caller_is_rejected() {
        let registry = MemoryRegistry::new();
        let admission = authorize(&registry, addr(7), addr(1), PoolId(1), addr(9)).await;
        assert_eq!(admission, None);
    }

    #[tokio::test]
    async fn earlier_rules_win() {
        let registry = MemoryRegistry::new();
        let user = addr(1);
        registry.set_approval_for_all(user, user, true).await;

        // Caller == receiver outranks the blanket approval it also holds.
        let admission = authorize(&registry, user, user, PoolId(1), user).await;
        assert_eq!(admission, Some(Admission::Receiver));
    }
}
