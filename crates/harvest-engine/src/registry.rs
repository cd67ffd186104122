//! Append-only pool registry.
//!
//! Pools are indexed by insertion order and never removed. Each pool may
//! carry a swap helper converting its interest token into the reward token.

use std::collections::HashMap;

use harvest_oracle::swap::Converter;
use harvest_types::{Address, Amount, PoolId};

use crate::source::InterestSource;
use crate::{EngineError, Result};

/// One registered pool.
pub struct PoolEntry {
    id: PoolId,
    source: Box<dyn InterestSource>,
    helper: Option<Box<dyn Converter>>,
    /// Interest collected but not yet converted.
    pending: Amount,
    /// Native interest collected from this pool over its lifetime.
    collected: Amount,
}

impl PoolEntry {
    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn address(&self) -> Address {
        self.source.address()
    }

    pub fn interest_token(&self) -> Address {
        self.source.interest_token()
    }

    /// Address of the configured swap helper, if any.
    pub fn swap_helper(&self) -> Option<Address> {
        self.helper.as_ref().map(|h| h.address())
    }

    /// Token this pool's interest ends up as after conversion.
    pub fn output_token(&self) -> Address {
        match &self.helper {
            Some(helper) => helper.token_out(),
            None => self.source.interest_token(),
        }
    }

    /// Native interest held back from a failed conversion.
    pub fn pending(&self) -> Amount {
        self.pending
    }

    /// Native interest collected from this pool so far.
    pub fn collected(&self) -> Amount {
        self.collected
    }

    pub(crate) fn source(&self) -> &dyn InterestSource {
        self.source.as_ref()
    }

    pub(crate) fn source_mut(&mut self) -> &mut dyn InterestSource {
        self.source.as_mut()
    }

    pub(crate) fn helper(&self) -> Option<&dyn Converter> {
        self.helper.as_deref()
    }

    pub(crate) fn helper_mut(&mut self) -> Option<&mut (dyn Converter + 'static)> {
        self.helper.as_deref_mut()
    }

    pub(crate) fn set_pending(&mut self, amount: Amount) {
        self.pending = amount;
    }

    pub(crate) fn record_collected(&mut self, amount: Amount) -> Result<()> {
        self.collected = self
            .collected
            .checked_add(amount)
            .ok_or(EngineError::Overflow)?;
        Ok(())
    }
}

impl std::fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.id)
            .field("address", &self.address())
            .field("swap_helper", &self.swap_helper())
            .field("pending", &self.pending)
            .field("collected", &self.collected)
            .finish()
    }
}

fn check_helper(source: &dyn InterestSource, helper: &dyn Converter) -> Result<()> {
    if helper.token_in() != source.interest_token() {
        return Err(EngineError::HelperMismatch {
            pool_token: source.interest_token(),
            helper_token: helper.token_in(),
        });
    }
    Ok(())
}

/// Ordered pool registry.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: Vec<PoolEntry>,
    by_address: HashMap<Address, PoolId>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pool and return its index.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DuplicatePool`] if the address is already registered
    /// - [`EngineError::HelperMismatch`] if the helper does not consume the
    ///   pool's interest token
    pub fn add(
        &mut self,
        source: Box<dyn InterestSource>,
        helper: Option<Box<dyn Converter>>,
    ) -> Result<PoolId> {
        let address = source.address();
        if let Some(&pool_id) = self.by_address.get(&address) {
            return Err(EngineError::DuplicatePool {
                pool: address,
                pool_id,
            });
        }
        if let Some(helper) = &helper {
            check_helper(source.as_ref(), helper.as_ref())?;
        }

        let id = self.pools.len();
        self.pools.push(PoolEntry {
            id,
            source,
            helper,
            pending: 0,
            collected: 0,
        });
        self.by_address.insert(address, id);
        Ok(id)
    }

    /// Replace a pool's swap helper; `None` clears it.
    ///
    /// Returns the previous and new helper addresses.
    pub fn set_helper(
        &mut self,
        pool_id: PoolId,
        helper: Option<Box<dyn Converter>>,
    ) -> Result<(Option<Address>, Option<Address>)> {
        let entry = self
            .pools
            .get_mut(pool_id)
            .ok_or(EngineError::UnknownPool { pool_id })?;
        if let Some(helper) = &helper {
            check_helper(entry.source.as_ref(), helper.as_ref())?;
        }
        let old = entry.swap_helper();
        entry.helper = helper;
        Ok((old, entry.swap_helper()))
    }

    pub fn get(&self, pool_id: PoolId) -> Option<&PoolEntry> {
        self.pools.get(pool_id)
    }

    pub(crate) fn get_mut(&mut self, pool_id: PoolId) -> Option<&mut PoolEntry> {
        self.pools.get_mut(pool_id)
    }

    /// Index of the pool registered at `address`.
    pub fn find(&self, address: &Address) -> Option<PoolId> {
        self.by_address.get(address).copied()
    }

    pub fn pools(&self) -> &[PoolEntry] {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
