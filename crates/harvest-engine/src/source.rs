//! Pool adapter interface.
//!
//! An [`InterestSource`] is one interest-bearing pool. The engine asks how
//! much interest is available, then collects it into its own account.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use harvest_types::{Address, Amount};

/// Pool adapter failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The pool cannot be reached or cannot report its balance.
    #[error("pool unavailable: {0}")]
    Unavailable(String),

    /// The collection call reverted.
    #[error("collection reverted: {0}")]
    Reverted(String),

    /// The adapter delivered more than it reported as available.
    #[error("collected {collected} but only {available} was available")]
    Overcollected {
        /// Amount reported before collection.
        available: Amount,
        /// Amount actually delivered.
        collected: Amount,
    },

    /// Arithmetic overflow inside the adapter.
    #[error("arithmetic overflow")]
    Overflow,
}

/// An interest-bearing pool.
pub trait InterestSource {
    /// The pool's address; unique within a registry.
    fn address(&self) -> Address;

    /// Token the pool pays interest in.
    fn interest_token(&self) -> Address;

    /// Interest currently collectable. Read-only.
    fn interest_available(&self) -> Result<Amount, SourceError>;

    /// Move the available interest to the engine and return the amount
    /// delivered. May be below the last [`interest_available`] reading.
    ///
    /// [`interest_available`]: InterestSource::interest_available
    fn collect_interest(&mut self) -> Result<Amount, SourceError>;
}

#[derive(Debug, Default)]
struct SourceState {
    principal: Amount,
    balance: Amount,
    collected: Amount,
    offline: bool,
    fail_next: bool,
    shortfall: Amount,
    surplus: Amount,
}

/// In-memory accruing pool.
///
/// Deposits raise principal and balance together; accrual raises the
/// balance only. Interest is the balance above principal. Clones share
/// state, so a test can keep a handle after registering the pool.
#[derive(Debug, Clone)]
pub struct MemorySource {
    address: Address,
    token: Address,
    state: Rc<RefCell<SourceState>>,
}

impl MemorySource {
    /// Create an empty pool paying interest in `token`.
    pub fn new(address: Address, token: Address) -> Self {
        Self {
            address,
            token,
            state: Rc::new(RefCell::new(SourceState::default())),
        }
    }

    /// Add principal.
    pub fn deposit(&self, amount: Amount) {
        let mut state = self.state.borrow_mut();
        state.principal = state.principal.saturating_add(amount);
        state.balance = state.balance.saturating_add(amount);
    }

    /// Add interest.
    pub fn accrue(&self, amount: Amount) {
        let mut state = self.state.borrow_mut();
        state.balance = state.balance.saturating_add(amount);
    }

    /// Grow the balance by `numerator / denominator` of the principal.
    pub fn accrue_rate(&self, numerator: u128, denominator: u128) {
        let interest = {
            let state = self.state.borrow();
            state
                .principal
                .checked_mul(numerator)
                .and_then(|v| v.checked_div(denominator))
                .unwrap_or(0)
        };
        self.accrue(interest);
    }

    /// Make every call fail with [`SourceError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    /// Make the next collection revert after a successful reading.
    pub fn fail_next_collect(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    /// Deliver this much less than available on each collection.
    pub fn set_shortfall(&self, shortfall: Amount) {
        self.state.borrow_mut().shortfall = shortfall;
    }

    /// Deliver this much more than available on each collection.
    pub fn set_surplus(&self, surplus: Amount) {
        self.state.borrow_mut().surplus = surplus;
    }

    /// Current principal.
    pub fn principal(&self) -> Amount {
        self.state.borrow().principal
    }

    /// Current balance (principal plus uncollected interest).
    pub fn balance(&self) -> Amount {
        self.state.borrow().balance
    }

    /// Interest delivered over the pool's lifetime.
    pub fn total_collected(&self) -> Amount {
        self.state.borrow().collected
    }
}

impl InterestSource for MemorySource {
    fn address(&self) -> Address {
        self.address
    }

    fn interest_token(&self) -> Address {
        self.token
    }

    fn interest_available(&self) -> Result<Amount, SourceError> {
        let state = self.state.borrow();
        if state.offline {
            return Err(SourceError::Unavailable(format!("{} offline", self.address)));
        }
        Ok(state.balance.saturating_sub(state.principal))
    }

    fn collect_interest(&mut self) -> Result<Amount, SourceError> {
        let available = self.interest_available()?;
        let mut state = self.state.borrow_mut();
        if state.fail_next {
            state.fail_next = false;
            return Err(SourceError::Reverted(format!(
                "{} collection reverted",
                self.address
            )));
        }

        let delivered = available
            .saturating_sub(state.shortfall)
            .checked_add(state.surplus)
            .ok_or(SourceError::Overflow)?;
        state.balance = state.principal;
        state.collected = state
            .collected
            .checked_add(delivered)
            .ok_or(SourceError::Overflow)?;

        debug!(pool = %self.address, available, delivered, "interest collected");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> MemorySource {
        MemorySource::new(Address::from_low_u64(10), Address::from_low_u64(20))
    }

    #[test]
    fn test_accrue_rate() {
        let source = pool();
        source.deposit(10_000);
        source.accrue_rate(10, 100);
        assert_eq!(source.balance(), 11_000);
        assert_eq!(source.interest_available().expect("available"), 1_000);
    }

    #[test]
    fn test_collect_resets_to_principal() {
        let source = pool();
        source.deposit(500);
        source.accrue(50);

        let mut handle = source.clone();
        assert_eq!(handle.collect_interest().expect("collect"), 50);
        assert_eq!(source.balance(), 500);
        assert_eq!(source.interest_available().expect("available"), 0);
        assert_eq!(source.total_collected(), 50);
    }

    #[test]
    fn test_offline() {
        let mut source = pool();
        source.set_offline(true);
        assert!(matches!(
            source.interest_available(),
            Err(SourceError::Unavailable(_))
        ));
        assert!(source.collect_interest().is_err());
    }

    #[test]
    fn test_fail_next_collect_is_one_shot() {
        let mut source = pool();
        source.deposit(100);
        source.accrue(7);
        source.fail_next_collect();
        assert!(matches!(
            source.collect_interest(),
            Err(SourceError::Reverted(_))
        ));
        assert_eq!(source.interest_available().expect("available"), 7);
        assert_eq!(source.collect_interest().expect("collect"), 7);
    }

    #[test]
    fn test_shortfall_and_surplus() {
        let mut source = pool();
        source.deposit(100);
        source.accrue(10);
        source.set_shortfall(3);
        assert_eq!(source.collect_interest().expect("collect"), 7);

        source.set_shortfall(0);
        source.set_surplus(2);
        source.accrue(10);
        assert_eq!(source.collect_interest().expect("collect"), 12);
    }
}
