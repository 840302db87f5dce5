//! Walks a pool through its full claim cycle
//!
//! This example shows that:
//! 1. Creating a pool takes the deposit into custody
//! 2. A claim signed by the pool's signer dispenses through a strategy
//! 3. Replaying the same signed claim is rejected
//! 4. Unapproved callers cannot redeem someone else's claim
//! 5. Every state change is visible in the event log
//!
//! Run with: cargo run --example claim_cycle

use std::sync::Arc;

use dispenser_engine::memory::{DealStrategy, LockStrategy, MemoryEvents, MemoryRegistry, MemoryVault};
use dispenser_engine::{
    Address, ClaimRequest, ClaimSigner, DispenserEngine, EngineConfig, Split,
};
use dispenser_ledger::PoolLedger;

const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            Dispenser Claim Cycle Demonstration               ║");
    println!("║                                                              ║");
    println!("║  Invariant: claims settle exactly once, or not at all.       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // Wire the engine against in-memory collaborators.
    let ledger = PoolLedger::new();
    let vault = Arc::new(MemoryVault::new());
    let registry = Arc::new(MemoryRegistry::new());
    let events = Arc::new(MemoryEvents::new());
    let engine = DispenserEngine::new(
        EngineConfig::default(),
        ledger.clone(),
        vault.clone(),
        registry.clone(),
        events.clone(),
    );

    let lock_addr = Address([0x51; 20]);
    let deal_addr = Address([0xDE; 20]);
    let lock = Arc::new(LockStrategy::new(registry.clone()));
    engine.register_strategy(lock_addr, lock.clone()).await;
    engine
        .register_strategy(
            deal_addr,
            Arc::new(DealStrategy::new(ledger, vault.clone(), registry.clone())),
        )
        .await;

    let signer = ClaimSigner::for_label("project treasury");
    let funder = Address([0xF0; 20]);
    let receiver = Address([0xAA; 20]);
    let token = Address([0x70; 20]);
    vault.mint(token, funder, 100 * ONE_TOKEN).await;

    println!("📊 Initial Setup:");
    println!("   Engine:        {} ({:?})", engine.name(), engine.config().scheme);
    println!("   Pool signer:   {}", signer.address());
    println!("   Funder tokens: {}", vault.balance_of(token, funder).await);
    println!();

    // =========================================================================
    // Step 1: Create and fund a pool
    // =========================================================================
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 1: Create a pool holding 10 tokens");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let pool_id = engine
        .create_pool(funder, signer.address(), token, 10 * ONE_TOKEN, b"signature")
        .await
        .unwrap();

    println!("✓ Created {}", pool_id);
    println!("  In custody:  {}", vault.held(token).await);
    println!("  Remaining:   {}", engine.remaining(pool_id).await);
    println!();

    // =========================================================================
    // Step 2: Dispense a signed claim through the lock strategy
    // =========================================================================
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 2: Signer authorizes 5 tokens, locked until 2103");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let claim = ClaimRequest {
        pool_id,
        valid_until: 4_500_000_000,
        receiver,
        splits: vec![Split {
            strategy: lock_addr,
            params: vec![5 * ONE_TOKEN, 4_200_000_000],
        }],
    };
    let signature = signer.sign_claim(engine.config().scheme, engine.domain(), &claim);
    println!("✓ Claim signed ({} bytes)", signature.len());

    let receipt = engine.dispense(receiver, &claim, &signature).await.unwrap();
    println!("✓ Dispensed!");
    println!(
        "{}",
        serde_json::to_string_pretty(&receipt).expect("receipt serializes")
    );
    let allocation = lock
        .allocation(receipt.allocations[0].allocation_id)
        .await
        .unwrap();
    println!(
        "  Locked allocation: {} base units for {} until {}",
        allocation.amount, allocation.receiver, allocation.unlock_at
    );
    println!();

    // =========================================================================
    // Step 3: Replay the same signed claim
    // =========================================================================
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 3: Replay the exact same claim and signature");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match engine.dispense(receiver, &claim, &signature).await {
        Ok(_) => println!("⚠ UNEXPECTED: replay succeeded"),
        Err(e) => println!("✓ Replay correctly rejected: {}", e),
    }
    println!("  Remaining unchanged: {}", engine.remaining(pool_id).await);
    println!();

    // =========================================================================
    // Step 4: An unapproved caller tries to redeem
    // =========================================================================
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 4: A stranger redeems a valid claim for someone else");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let fresh_claim = ClaimRequest {
        pool_id,
        valid_until: 4_500_000_000,
        receiver,
        splits: vec![Split {
            strategy: deal_addr,
            params: vec![2 * ONE_TOKEN],
        }],
    };
    let fresh_signature = signer.sign_claim(engine.config().scheme, engine.domain(), &fresh_claim);
    let stranger = Address([0x66; 20]);

    match engine.dispense(stranger, &fresh_claim, &fresh_signature).await {
        Ok(_) => println!("⚠ UNEXPECTED: stranger was admitted"),
        Err(e) => println!("✓ Stranger correctly rejected: {}", e),
    }
    println!();

    // =========================================================================
    // Step 5: The receiver redeems the same claim themselves
    // =========================================================================
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 5: The receiver redeems it (immediate deal settlement)");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match engine.dispense(receiver, &fresh_claim, &fresh_signature).await {
        Ok(receipt) => {
            println!("✓ Dispensed {} base units", receipt.dispensed);
            println!(
                "  Receiver token balance: {}",
                vault.balance_of(token, receiver).await
            );
            println!("  Pool remaining:         {}", receipt.remaining);
        }
        Err(e) => println!("⚠ UNEXPECTED: dispense failed: {}", e),
    }
    println!();

    // =========================================================================
    // Event log
    // =========================================================================
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         Event Log                            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    for event in events.all().await {
        println!(
            "{}",
            serde_json::to_string(&event).expect("event serializes")
        );
    }
    println!();
    println!("Claims settle exactly once; every rejection leaves no trace.");
}
