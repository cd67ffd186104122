//! Engine-held balances.

use std::collections::BTreeMap;

use serde::Serialize;

use harvest_types::{Address, Amount};

use crate::{EngineError, Result};

/// Per-token balances held by the engine and totals paid out.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Treasury {
    held: BTreeMap<Address, Amount>,
    paid: BTreeMap<Address, Amount>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self, token: &Address) -> Amount {
        self.held.get(token).copied().unwrap_or(0)
    }

    pub fn paid(&self, token: &Address) -> Amount {
        self.paid.get(token).copied().unwrap_or(0)
    }

    pub(crate) fn credit(&mut self, token: Address, amount: Amount) -> Result<()> {
        let balance = self.held.entry(token).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(EngineError::Overflow)?;
        Ok(())
    }

    /// Fail unless `required` of `token` is held.
    pub fn ensure_available(&self, token: Address, required: Amount) -> Result<()> {
        let available = self.held(&token);
        if required > available {
            return Err(EngineError::InsufficientBalance {
                token,
                required,
                available,
            });
        }
        Ok(())
    }

    pub(crate) fn pay(&mut self, token: Address, amount: Amount) -> Result<()> {
        self.ensure_available(token, amount)?;
        let balance = self.held.entry(token).or_insert(0);
        *balance -= amount;
        let paid = self.paid.entry(token).or_insert(0);
        *paid = paid.saturating_add(amount);
        Ok(())
    }

    /// Tokens with a nonzero balance or payout history.
    pub fn tokens(&self) -> impl Iterator<Item = &Address> {
        let mut tokens: Vec<&Address> = self.held.keys().chain(self.paid.keys()).collect();
        tokens.sort();
        tokens.dedup();
        tokens.into_iter()
    }
}
