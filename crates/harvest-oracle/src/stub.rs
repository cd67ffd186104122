//! Fixed-ratio converter.
//!
//! Converts at a constant integer ratio with no price check. Suitable for
//! trusted routes (e.g. wrapped and unwrapped forms of one asset) and for
//! development setups without live feeds.

use std::cell::Cell;
use std::rc::Rc;

use harvest_types::{Address, Amount};

use crate::swap::Converter;
use crate::{OracleError, Result};

/// A converter paying `ratio` output units per input unit.
#[derive(Debug, Clone)]
pub struct FixedRateConverter {
    address: Address,
    token_in: Address,
    token_out: Address,
    ratio: u128,
    converted: Rc<Cell<Amount>>,
}

impl FixedRateConverter {
    /// Create a converter.
    pub fn new(address: Address, token_in: Address, token_out: Address, ratio: u128) -> Self {
        Self {
            address,
            token_in,
            token_out,
            ratio,
            converted: Rc::new(Cell::new(0)),
        }
    }

    /// Total input converted so far (shared across clones).
    pub fn total_converted(&self) -> Amount {
        self.converted.get()
    }
}

impl Converter for FixedRateConverter {
    fn address(&self) -> Address {
        self.address
    }

    fn token_in(&self) -> Address {
        self.token_in
    }

    fn token_out(&self) -> Address {
        self.token_out
    }

    fn preview(&self, amount_in: Amount) -> Result<Amount> {
        amount_in.checked_mul(self.ratio).ok_or(OracleError::Overflow)
    }

    fn convert(&mut self, amount_in: Amount, _recipient: Address) -> Result<Amount> {
        let out = self.preview(amount_in)?;
        let total = self
            .converted
            .get()
            .checked_add(amount_in)
            .ok_or(OracleError::Overflow)?;
        self.converted.set(total);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ratio() {
        let mut conv = FixedRateConverter::new(
            Address::from_low_u64(1),
            Address::from_low_u64(2),
            Address::from_low_u64(3),
            3,
        );
        assert_eq!(conv.preview(1000).expect("preview"), 3000);
        assert_eq!(conv.convert(1000, Address::ZERO).expect("convert"), 3000);
        assert_eq!(conv.total_converted(), 1000);
    }

    #[test]
    fn test_overflow() {
        let conv = FixedRateConverter::new(
            Address::from_low_u64(1),
            Address::from_low_u64(2),
            Address::from_low_u64(3),
            2,
        );
        assert_eq!(conv.preview(u128::MAX), Err(OracleError::Overflow));
    }
}
