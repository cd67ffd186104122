//! Claim records and the settlement ledger.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use harvest_types::math::mul_div_floor;
use harvest_types::{Address, Amount, EpochId, Hash, ShareUnits};

use crate::{EngineError, Result};

/// A beneficiary's claim on one proof-mode epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub epoch_id: EpochId,
    pub share_units: ShareUnits,
    /// Sibling hashes from leaf to root.
    pub proof: Vec<Hash>,
}

impl Claim {
    pub fn new(epoch_id: EpochId, share_units: ShareUnits, proof: Vec<Hash>) -> Self {
        Self {
            epoch_id,
            share_units,
            proof,
        }
    }
}

/// A settled payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub epoch_id: EpochId,
    pub beneficiary: Address,
    pub token: Address,
    pub amount: Amount,
}

/// One flag per `(epoch, beneficiary)`; set flags are never cleared.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ClaimLedger {
    claimed: BTreeSet<(EpochId, Address)>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, epoch_id: EpochId, beneficiary: &Address) -> bool {
        self.claimed.contains(&(epoch_id, *beneficiary))
    }

    /// Set the flag. Returns `false` if it was already set.
    pub(crate) fn mark(&mut self, epoch_id: EpochId, beneficiary: Address) -> bool {
        self.claimed.insert((epoch_id, beneficiary))
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &(EpochId, Address)> {
        self.claimed.iter()
    }
}

/// `floor(interest_earned * share_units / total_shares)`.
///
/// Summed over a valid allocation this never exceeds `interest_earned`;
/// the rounding remainder stays with the engine.
pub fn pro_rata(
    interest_earned: Amount,
    share_units: ShareUnits,
    total_shares: ShareUnits,
) -> Result<Amount> {
    if total_shares == 0 {
        return Err(EngineError::InvalidConfiguration(
            "total_shares is zero".to_string(),
        ));
    }
    mul_div_floor(interest_earned, share_units, total_shares).ok_or(EngineError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pro_rata_scenario() {
        // 3000 reward over shares 100/200/300/400
        let paid: Vec<Amount> = [100u128, 200, 300, 400]
            .iter()
            .map(|s| pro_rata(3000, *s, 1000).expect("pro rata"))
            .collect();
        assert_eq!(paid, vec![300, 600, 900, 1200]);
    }

    #[test]
    fn test_pro_rata_rounds_down() {
        let paid: Amount = (0..3)
            .map(|_| pro_rata(100, 1, 3).expect("pro rata"))
            .sum();
        assert_eq!(paid, 99);
    }

    #[test]
    fn test_pro_rata_zero_total() {
        assert!(matches!(
            pro_rata(100, 1, 0),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_ledger_mark_once() {
        let mut ledger = ClaimLedger::new();
        let who = Address::from_low_u64(4);
        assert!(!ledger.is_claimed(0, &who));
        assert!(ledger.mark(0, who));
        assert!(!ledger.mark(0, who));
        assert!(ledger.is_claimed(0, &who));
        assert!(!ledger.is_claimed(1, &who));
        assert_eq!(ledger.len(), 1);
    }
}
