//! Serializable view of engine state.
//!
//! Everything the engine persists across calls, flattened into lists so it
//! encodes cleanly as JSON. Adapters themselves are not captured, only
//! their addresses.

use serde::Serialize;

use harvest_types::{Address, Amount, EpochId, PoolId};

use crate::config::Authority;
use crate::engine::DistributionEngine;
use crate::epoch::Epoch;

/// A registered pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub pool_id: PoolId,
    pub pool: Address,
    pub interest_token: Address,
    pub swap_helper: Option<Address>,
    pub pending: Amount,
    pub collected: Amount,
}

/// A settled `(epoch, beneficiary)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimedEntry {
    pub epoch_id: EpochId,
    pub beneficiary: Address,
}

/// Per-token treasury totals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceEntry {
    pub token: Address,
    pub held: Amount,
    pub paid: Amount,
}

/// Point-in-time engine state.
#[derive(Clone, Debug, Serialize)]
pub struct EngineSnapshot {
    pub authority: Authority,
    pub engine_account: Address,
    pub reward_token: Address,
    pub max_page_size: usize,
    pub pools: Vec<PoolSnapshot>,
    pub epochs: Vec<Epoch>,
    pub claimed: Vec<ClaimedEntry>,
    pub balances: Vec<BalanceEntry>,
}

impl EngineSnapshot {
    pub(crate) fn capture(engine: &DistributionEngine) -> Self {
        let pools = engine
            .pools()
            .iter()
            .map(|entry| PoolSnapshot {
                pool_id: entry.id(),
                pool: entry.address(),
                interest_token: entry.interest_token(),
                swap_helper: entry.swap_helper(),
                pending: entry.pending(),
                collected: entry.collected(),
            })
            .collect();

        let claimed = engine
            .ledger()
            .entries()
            .map(|&(epoch_id, beneficiary)| ClaimedEntry {
                epoch_id,
                beneficiary,
            })
            .collect();

        let treasury = engine.treasury();
        let balances = treasury
            .tokens()
            .map(|token| BalanceEntry {
                token: *token,
                held: treasury.held(token),
                paid: treasury.paid(token),
            })
            .collect();

        Self {
            authority: engine.authority(),
            engine_account: engine.engine_account(),
            reward_token: engine.reward_token(),
            max_page_size: engine.max_page_size(),
            pools,
            epochs: engine.epochs().to_vec(),
            claimed,
            balances,
        }
    }

    /// Open (non-final) epoch, if any.
    pub fn open_epoch(&self) -> Option<&Epoch> {
        self.epochs.last().filter(|e| e.is_open())
    }
}
