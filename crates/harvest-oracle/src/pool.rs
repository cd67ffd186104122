//! Swap pool interface and an in-memory constant-product pair.
//!
//! ## Formula
//!
//! ```text
//! in_with_fee = amount_in * (10_000 - fee_bps)
//! amount_out  = in_with_fee * reserve_out / (reserve_in * 10_000 + in_with_fee)
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use harvest_types::{Address, Amount};

use crate::{OracleError, Result};

/// Basis-point denominator for pool fees.
pub const BPS: u128 = 10_000;

/// Standard constant-product pool fee (0.3%).
pub const DEFAULT_FEE_BPS: u16 = 30;

/// A two-token swap pool.
pub trait SwapPool {
    /// Pool identity.
    fn address(&self) -> Address;

    /// First token of the pair.
    fn token0(&self) -> Address;

    /// Second token of the pair.
    fn token1(&self) -> Address;

    /// Swap fee in basis points.
    fn fee_bps(&self) -> u16;

    /// Current `(reserve0, reserve1)`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unavailable`] if the pool cannot be read
    fn reserves(&self) -> Result<(Amount, Amount)>;

    /// Swap `amount_in` of `token_in` for exactly `amount_out` of the other
    /// token, delivered to `recipient`. Returns the amount delivered.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UnsupportedToken`] if `token_in` is not in the pair
    /// - [`OracleError::ExcessiveOutput`] if the reserves cannot support `amount_out`
    fn swap(
        &mut self,
        token_in: Address,
        amount_in: Amount,
        amount_out: Amount,
        recipient: Address,
    ) -> Result<Amount>;
}

/// Output of a constant-product swap at the given reserves.
///
/// # Errors
///
/// - [`OracleError::InsufficientLiquidity`] if either reserve is zero
/// - [`OracleError::Overflow`] on arithmetic overflow
pub fn get_amount_out(
    amount_in: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
    fee_bps: u16,
) -> Result<Amount> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(OracleError::InsufficientLiquidity {
            reserve_in,
            reserve_out,
        });
    }
    let fee_factor = BPS.saturating_sub(u128::from(fee_bps));
    let in_with_fee = amount_in
        .checked_mul(fee_factor)
        .ok_or(OracleError::Overflow)?;
    let numerator = in_with_fee
        .checked_mul(reserve_out)
        .ok_or(OracleError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(BPS)
        .and_then(|v| v.checked_add(in_with_fee))
        .ok_or(OracleError::Overflow)?;
    Ok(numerator / denominator)
}

#[derive(Debug)]
struct PairState {
    reserve0: Amount,
    reserve1: Amount,
    delivered: BTreeMap<(Address, Address), Amount>,
    offline: bool,
}

/// An in-memory constant-product pair.
///
/// Clones share the same reserves, so a handle can keep moving the price
/// after the pool has been handed to a swap helper.
#[derive(Debug, Clone)]
pub struct ConstantProductPool {
    address: Address,
    token0: Address,
    token1: Address,
    fee_bps: u16,
    state: Rc<RefCell<PairState>>,
}

impl ConstantProductPool {
    /// Create a pair with the given reserves and fee.
    pub fn new(
        address: Address,
        token0: Address,
        token1: Address,
        reserve0: Amount,
        reserve1: Amount,
        fee_bps: u16,
    ) -> Self {
        Self {
            address,
            token0,
            token1,
            fee_bps,
            state: Rc::new(RefCell::new(PairState {
                reserve0,
                reserve1,
                delivered: BTreeMap::new(),
                offline: false,
            })),
        }
    }

    /// Overwrite the reserves (moves the pool price).
    pub fn set_reserves(&self, reserve0: Amount, reserve1: Amount) {
        let mut state = self.state.borrow_mut();
        state.reserve0 = reserve0;
        state.reserve1 = reserve1;
    }

    /// Make every read and swap fail until re-enabled.
    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    /// Total of `token` delivered to `recipient` by this pool.
    pub fn delivered(&self, token: Address, recipient: Address) -> Amount {
        self.state
            .borrow()
            .delivered
            .get(&(token, recipient))
            .copied()
            .unwrap_or(0)
    }

    /// Quote a swap of `amount_in` of `token_in` at current reserves.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UnsupportedToken`] if `token_in` is not in the pair
    pub fn quote(&self, token_in: Address, amount_in: Amount) -> Result<Amount> {
        let (reserve_in, reserve_out) = self.oriented_reserves(token_in)?;
        get_amount_out(amount_in, reserve_in, reserve_out, self.fee_bps)
    }

    fn oriented_reserves(&self, token_in: Address) -> Result<(Amount, Amount)> {
        let (reserve0, reserve1) = self.reserves()?;
        if token_in == self.token0 {
            Ok((reserve0, reserve1))
        } else if token_in == self.token1 {
            Ok((reserve1, reserve0))
        } else {
            Err(OracleError::UnsupportedToken {
                pool: self.address,
                token: token_in,
            })
        }
    }
}

impl SwapPool for ConstantProductPool {
    fn address(&self) -> Address {
        self.address
    }

    fn token0(&self) -> Address {
        self.token0
    }

    fn token1(&self) -> Address {
        self.token1
    }

    fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    fn reserves(&self) -> Result<(Amount, Amount)> {
        let state = self.state.borrow();
        if state.offline {
            return Err(OracleError::Unavailable(format!(
                "pool {} offline",
                self.address
            )));
        }
        Ok((state.reserve0, state.reserve1))
    }

    fn swap(
        &mut self,
        token_in: Address,
        amount_in: Amount,
        amount_out: Amount,
        recipient: Address,
    ) -> Result<Amount> {
        let available = self.quote(token_in, amount_in)?;
        if amount_out > available {
            return Err(OracleError::ExcessiveOutput {
                requested: amount_out,
                available,
            });
        }

        let token_out = if token_in == self.token0 {
            self.token1
        } else {
            self.token0
        };

        let mut state = self.state.borrow_mut();
        let (reserve_in, reserve_out) = if token_in == self.token0 {
            (state.reserve0, state.reserve1)
        } else {
            (state.reserve1, state.reserve0)
        };
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(OracleError::Overflow)?;
        let new_out = reserve_out - amount_out;
        if token_in == self.token0 {
            state.reserve0 = new_in;
            state.reserve1 = new_out;
        } else {
            state.reserve1 = new_in;
            state.reserve0 = new_out;
        }
        let entry = state.delivered.entry((token_out, recipient)).or_insert(0);
        *entry = entry.checked_add(amount_out).ok_or(OracleError::Overflow)?;

        tracing::trace!(
            pool = %self.address,
            amount_in,
            amount_out,
            "constant-product swap executed"
        );

        Ok(amount_out)
    }
}
