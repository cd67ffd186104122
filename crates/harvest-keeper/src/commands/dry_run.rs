//! `dry-run <allocations.json> <pool_count> <interest_per_pool>`
//!
//! Runs one full proof-mode epoch against in-memory pools and prints what
//! every beneficiary would be paid. Useful for checking an allocation file
//! and page size before publishing a root.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;

use harvest_crypto::merkle::MerkleTree;
use harvest_engine::claims::Claim;
use harvest_engine::source::MemorySource;
use harvest_engine::{DistributionEngine, EngineConfig};
use harvest_types::{hash_to_hex, Address, Amount, EpochId, ShareUnits};

use crate::config::KeeperConfig;

/// First address used for the simulated pools.
const POOL_ADDRESS_BASE: u64 = 0x1000;

/// Outcome of a simulated epoch.
#[derive(Debug, Serialize)]
pub struct DryRunReport {
    pub epoch_id: EpochId,
    pub root: String,
    pub total_shares: ShareUnits,
    pub pages: usize,
    pub interest_earned: Amount,
    pub payouts: BTreeMap<String, Amount>,
    /// Rounding remainder left in the engine.
    pub remainder: Amount,
}

/// Placeholder accounts for any that the configuration leaves unset.
fn simulation_config(config: &EngineConfig, page_size: usize) -> EngineConfig {
    let or_placeholder = |addr: Address, n: u64| {
        if addr.is_zero() {
            Address::from_low_u64(n)
        } else {
            addr
        }
    };
    EngineConfig {
        admin: or_placeholder(config.admin, 1),
        oracle: or_placeholder(config.oracle, 2),
        engine_account: or_placeholder(config.engine_account, 3),
        reward_token: or_placeholder(config.reward_token, 4),
        max_page_size: page_size,
    }
}

/// Simulate one epoch.
pub fn simulate(
    config: &KeeperConfig,
    allocations: &[(Address, ShareUnits)],
    pool_count: usize,
    interest_per_pool: Amount,
) -> anyhow::Result<DryRunReport> {
    let engine_config = simulation_config(&config.engine, config.page_size());
    let (admin, oracle) = (engine_config.admin, engine_config.oracle);
    let reward_token = engine_config.reward_token;
    let mut engine = DistributionEngine::new(engine_config)?;

    for i in 0..pool_count {
        let address = Address::from_low_u64(POOL_ADDRESS_BASE + i as u64);
        let source = MemorySource::new(address, reward_token);
        source.accrue(interest_per_pool);
        engine.add_pool(admin, Box::new(source), None)?;
    }

    let tree = MerkleTree::from_allocations(allocations)?;
    let epoch_id = engine.define_epoch(oracle, tree.root(), tree.total_shares())?;

    let mut pages = 0;
    loop {
        let report = engine.collect_next_page(oracle, epoch_id)?;
        if !report.range.is_empty() {
            pages += 1;
        }
        if report.complete {
            break;
        }
    }
    engine.finalize_epoch(oracle)?;

    let mut payouts: BTreeMap<String, Amount> = BTreeMap::new();
    for (beneficiary, shares) in tree.allocations() {
        let claim = Claim::new(epoch_id, *shares, tree.proof(beneficiary)?);
        let settled = engine
            .claim_reward(*beneficiary, &[claim])
            .with_context(|| format!("claim for {beneficiary}"))?;
        let amount: Amount = settled.iter().map(|s| s.amount).sum();
        payouts.insert(beneficiary.to_string(), amount);
    }

    let interest_earned = engine
        .epoch(epoch_id)
        .map(|e| e.interest_earned)
        .unwrap_or_default();
    Ok(DryRunReport {
        epoch_id,
        root: hash_to_hex(&tree.root()),
        total_shares: tree.total_shares(),
        pages,
        interest_earned,
        payouts,
        remainder: engine.treasury().held(&reward_token),
    })
}

pub fn run(config: &KeeperConfig, args: &[String]) -> anyhow::Result<()> {
    let [input, pool_count, interest, ..] = args else {
        bail!("usage: harvest-keeper dry-run <allocations.json> <pool_count> <interest_per_pool>");
    };
    let allocations = super::read_allocations(Path::new(input))?;
    let pool_count: usize = pool_count.parse().context("invalid pool count")?;
    let interest: Amount = interest.parse().context("invalid interest amount")?;

    let report = simulate(config, &allocations, pool_count, interest)?;
    info!(
        epoch_id = report.epoch_id,
        pages = report.pages,
        interest_earned = report.interest_earned,
        remainder = report.remainder,
        "Dry run complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
