//! Audit events emitted by the distribution engine.
//!
//! Every successful state change appends exactly one event per observable
//! effect. Failed operations emit nothing.

use serde::{Deserialize, Serialize};

use crate::{Address, Amount, EpochId, Hash, PoolId, ShareUnits};

/// How an epoch's reward is settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum DistributionMode {
    /// Beneficiaries self-claim against a Merkle commitment.
    Proof {
        /// Merkle root over `(beneficiary, share_units)` leaves.
        root: Hash,
        /// Sum of all committed share units.
        total_shares: ShareUnits,
    },
    /// The oracle pushes pre-computed payouts directly.
    Push,
}

impl DistributionMode {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            DistributionMode::Proof { .. } => "proof",
            DistributionMode::Push => "push",
        }
    }
}

/// All engine events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum EngineEvent {
    // Registry events
    PoolAdded {
        pool_id: PoolId,
        pool: Address,
        /// `Address::ZERO` when no conversion is configured.
        swap_helper: Address,
    },
    SwapHelperChanged {
        pool_id: PoolId,
        old_helper: Address,
        new_helper: Address,
    },

    // Epoch events
    EpochDefined {
        epoch_id: EpochId,
        mode: DistributionMode,
    },
    InterestCollected {
        epoch_id: EpochId,
        pool_id: PoolId,
        /// Amount collected in the pool's native interest token.
        collected: Amount,
        /// Amount credited in the reward token.
        credited: Amount,
    },
    EpochFinalized {
        epoch_id: EpochId,
        interest_earned: Amount,
        reward_token: Address,
    },

    // Settlement events
    RewardClaimed {
        epoch_id: EpochId,
        beneficiary: Address,
        token: Address,
        amount: Amount,
    },
    InterestDistributed {
        token: Address,
        beneficiary: Address,
        amount: Amount,
    },

    // Administrative events
    RewardTokenChanged {
        old_token: Address,
        new_token: Address,
    },
    OracleAccountChanged {
        old_account: Address,
        new_account: Address,
    },
    AdminAccountChanged {
        old_account: Address,
        new_account: Address,
    },
}

impl EngineEvent {
    /// Event name as it appears in serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::PoolAdded { .. } => "pool_added",
            EngineEvent::SwapHelperChanged { .. } => "swap_helper_changed",
            EngineEvent::EpochDefined { .. } => "epoch_defined",
            EngineEvent::InterestCollected { .. } => "interest_collected",
            EngineEvent::EpochFinalized { .. } => "epoch_finalized",
            EngineEvent::RewardClaimed { .. } => "reward_claimed",
            EngineEvent::InterestDistributed { .. } => "interest_distributed",
            EngineEvent::RewardTokenChanged { .. } => "reward_token_changed",
            EngineEvent::OracleAccountChanged { .. } => "oracle_account_changed",
            EngineEvent::AdminAccountChanged { .. } => "admin_account_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_matches_name() {
        let event = EngineEvent::EpochFinalized {
            epoch_id: 3,
            interest_earned: 3000,
            reward_token: Address::from_low_u64(9),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], event.name());
        assert_eq!(json["epoch_id"], 3);
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(DistributionMode::Push.label(), "push");
        let proof = DistributionMode::Proof {
            root: [0u8; 32],
            total_shares: 10,
        };
        assert_eq!(proof.label(), "proof");
    }
}
