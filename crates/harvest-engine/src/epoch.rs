//! Epoch records and collection paging.

use std::ops::Range;

use serde::Serialize;

use harvest_types::events::DistributionMode;
use harvest_types::{Address, Amount, EpochId};

use crate::{EngineError, Result};

/// Lifecycle of an epoch. Only the latest epoch may be non-final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochState {
    /// Defined; no page collected yet.
    Defined,
    /// At least one page collected.
    Collecting,
    /// Totals locked; claims open.
    Finalized,
}

/// One distribution period.
#[derive(Clone, Debug, Serialize)]
pub struct Epoch {
    pub id: EpochId,
    pub state: EpochState,
    pub mode: DistributionMode,
    /// Reward collected for this epoch.
    pub interest_earned: Amount,
    /// Reward token snapshotted at finalization.
    pub reward_token: Option<Address>,
    /// Pools processed so far.
    pub cursor: usize,
    /// Reward that arrived during a failed page, folded in by the next
    /// successful one.
    pub carried: Amount,
    /// Reward settled by claims so far; never exceeds `interest_earned`.
    pub paid_out: Amount,
}

/// Outcome of matching a requested page against the cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageDecision {
    /// Every pool in the page was already collected.
    AlreadyCollected,
    /// Collect this range of pool indices.
    Process(Range<usize>),
}

impl Epoch {
    pub(crate) fn new(id: EpochId, mode: DistributionMode) -> Self {
        Self {
            id,
            state: EpochState::Defined,
            mode,
            interest_earned: 0,
            reward_token: None,
            cursor: 0,
            carried: 0,
            paid_out: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state != EpochState::Finalized
    }

    /// Share total for proof-mode epochs.
    pub fn total_shares(&self) -> Option<u128> {
        match self.mode {
            DistributionMode::Proof { total_shares, .. } => Some(total_shares),
            DistributionMode::Push => None,
        }
    }

    /// Decide what a `(start, count)` page request means for this epoch.
    ///
    /// The page end is clamped to `pool_count`. A page entirely below the
    /// cursor is a replay; a page starting at the cursor is processed;
    /// gaps and overlaps are rejected.
    pub fn resolve_page(
        &self,
        start: usize,
        count: usize,
        pool_count: usize,
    ) -> Result<PageDecision> {
        let mismatch = EngineError::PaginationMismatch {
            epoch_id: self.id,
            start,
            cursor: self.cursor,
        };
        if start > pool_count {
            return Err(mismatch);
        }
        let end = start.saturating_add(count).min(pool_count);
        if end <= self.cursor {
            return Ok(PageDecision::AlreadyCollected);
        }
        if start != self.cursor {
            return Err(mismatch);
        }
        Ok(PageDecision::Process(start..end))
    }
}
