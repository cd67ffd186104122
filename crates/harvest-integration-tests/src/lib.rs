//! Integration test crate for the Harvest distribution engine.
//!
//! The library part only holds fixtures shared by the scenarios under
//! `tests/`, which drive full epochs across the crypto, oracle and engine
//! crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p harvest-integration-tests
//! ```

use harvest_crypto::merkle::MerkleTree;
use harvest_engine::claims::Claim;
use harvest_engine::source::MemorySource;
use harvest_engine::{DistributionEngine, EngineConfig, Result};
use harvest_types::{Address, Amount, EpochId, ShareUnits};

/// Account holding the admin role in every fixture engine.
pub fn admin() -> Address {
    Address::from_low_u64(0xad)
}

/// Account holding the oracle role in every fixture engine.
pub fn oracle() -> Address {
    Address::from_low_u64(0x0c)
}

/// The engine's own account (swap recipient).
pub fn engine_account() -> Address {
    Address::from_low_u64(0xe0)
}

/// Default reward token.
pub fn reward_token() -> Address {
    Address::from_low_u64(0x7e)
}

/// Interest token of pools that need conversion.
pub fn native_token() -> Address {
    Address::from_low_u64(0x7a)
}

/// Beneficiary number `n`.
pub fn beneficiary(n: u64) -> Address {
    Address::from_low_u64(0xb000 + n)
}

/// Pool address number `n`.
pub fn pool_address(n: u64) -> Address {
    Address::from_low_u64(0x9000 + n)
}

/// An engine with the fixture accounts and the given page limit.
pub fn engine(max_page_size: usize) -> Result<DistributionEngine> {
    let config = EngineConfig {
        engine_account: engine_account(),
        max_page_size,
        ..EngineConfig::new(admin(), oracle(), reward_token())
    };
    DistributionEngine::new(config)
}

/// A pool paying `token`, with `principal` deposited.
pub fn memory_pool(n: u64, token: Address, principal: Amount) -> MemorySource {
    let source = MemorySource::new(pool_address(n), token);
    source.deposit(principal);
    source
}

/// Register a reward-token pool holding `interest` ready to collect.
pub fn add_reward_pool(
    engine: &mut DistributionEngine,
    n: u64,
    interest: Amount,
) -> Result<MemorySource> {
    let source = memory_pool(n, reward_token(), 1_000_000);
    source.accrue(interest);
    engine.add_pool(admin(), Box::new(source.clone()), None)?;
    Ok(source)
}

/// Collect every page of `epoch_id` in configured-size steps.
pub fn collect_all(engine: &mut DistributionEngine, epoch_id: EpochId) -> Result<usize> {
    let mut pages = 0;
    loop {
        let report = engine.collect_next_page(oracle(), epoch_id)?;
        if !report.range.is_empty() {
            pages += 1;
        }
        if report.complete {
            return Ok(pages);
        }
    }
}

/// Define a proof epoch for `tree`, collect everything and finalize.
pub fn run_proof_epoch(engine: &mut DistributionEngine, tree: &MerkleTree) -> Result<EpochId> {
    let epoch_id = engine.define_epoch(oracle(), tree.root(), tree.total_shares())?;
    collect_all(engine, epoch_id)?;
    engine.finalize_epoch(oracle())?;
    Ok(epoch_id)
}

/// The claim `who` would submit for `epoch_id` against `tree`.
pub fn claim_for(tree: &MerkleTree, epoch_id: EpochId, who: &Address) -> Claim {
    let shares: ShareUnits = tree.shares_of(who).unwrap_or(0);
    let proof = tree.proof(who).unwrap_or_default();
    Claim::new(epoch_id, shares, proof)
}
