//! Strategy registration and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use dispenser_types::Address;

use crate::traits::AllocationStrategy;

/// Registry of allocation strategies keyed by their address.
///
/// The address is what claims are signed over; the binding to an
/// implementation is wiring, done once at startup (or in tests, whenever).
/// The zero address never resolves.
pub struct StrategyGateway {
    strategies: RwLock<HashMap<Address, Arc<dyn AllocationStrategy>>>,
}

impl StrategyGateway {
    pub fn new() -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a strategy implementation to its address. Rebinding replaces.
    pub async fn register(&self, address: Address, strategy: Arc<dyn AllocationStrategy>) {
        let mut strategies = self.strategies.write().await;
        strategies.insert(address, strategy);
    }

    /// Resolve a strategy address. `None` for the zero address or anything
    /// unregistered.
    pub async fn resolve(&self, address: Address) -> Option<Arc<dyn AllocationStrategy>> {
        if address.is_zero() {
            return None;
        }
        let strategies = self.strategies.read().await;
        strategies.get(&address).cloned()
    }

    /// Addresses with a registered strategy.
    pub async fn registered(&self) -> Vec<Address> {
        let strategies = self.strategies.read().await;
        strategies.keys().copied().collect()
    }
}

impl Default for StrategyGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FailingStrategy;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[tokio::test]
    async fn resolves_registered_strategies_only() {
        let gateway = StrategyGateway::new();
        assert!(gateway.resolve(addr(1)).await.is_none());

        gateway.register(addr(1), Arc::new(FailingStrategy)).await;
        assert!(gateway.resolve(addr(1)).await.is_some());
        assert!(gateway.resolve(addr(2)).await.is_none());
        assert_eq!(gateway.registered().await, vec![addr(1)]);
    }

    #[tokio::test]
    async fn zero_address_never_resolves() {
        let gateway = StrategyGateway::new();
        gateway.register(Address::ZERO, Arc::new(FailingStrategy)).await;
        assert!(gateway.resolve(Address::ZERO).await.is_none());
    }
}
