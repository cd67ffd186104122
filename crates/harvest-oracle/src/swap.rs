//! Slippage-bounded conversion of interest into the reward token.
//!
//! The helper derives a reference output from two independent price feeds
//! and compares it against what the swap pool would deliver *now*:
//!
//! ```text
//! reference = amount_in * price_in * 10^(dec_feed_out + dec_token_out)
//!                       / (price_out * 10^(dec_feed_in + dec_token_in))
//! minimum   = floor(reference * numerator / denominator)
//! ```
//!
//! Execution is refused when the pool's output at current reserves is below
//! `minimum`. Nothing is cached between calls.

use serde::{Deserialize, Serialize};

use harvest_types::math::mul_div_floor;
use harvest_types::{Address, Amount};

use crate::feed::{positive_answer, PriceFeed};
use crate::pool::{get_amount_out, SwapPool};
use crate::{OracleError, Result};

/// Converts an amount of one token into another.
pub trait Converter {
    /// Converter identity (reported in audit events).
    fn address(&self) -> Address;

    /// Token consumed.
    fn token_in(&self) -> Address;

    /// Token produced.
    fn token_out(&self) -> Address;

    /// Output a conversion of `amount_in` would deliver right now, after
    /// every price check. Read-only.
    ///
    /// # Errors
    ///
    /// - [`OracleError::SlippageExceeded`] if the conversion would be refused
    fn preview(&self, amount_in: Amount) -> Result<Amount>;

    /// Convert `amount_in`, delivering the output to `recipient`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::SlippageExceeded`] if the realized output is below the bound
    fn convert(&mut self, amount_in: Amount, recipient: Address) -> Result<Amount>;
}

/// Minimum acceptable fraction of the reference output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slippage {
    pub numerator: u128,
    pub denominator: u128,
}

impl Slippage {
    /// Build a bound, requiring `0 < numerator <= denominator`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidSlippage`] if the fraction is outside `(0, 1]`
    pub fn new(numerator: u128, denominator: u128) -> Result<Self> {
        if numerator == 0 || denominator == 0 || numerator > denominator {
            return Err(OracleError::InvalidSlippage {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

/// Token-side parameters of a swap route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRoute {
    /// Interest token being sold.
    pub token_in: Address,
    /// Reward token being bought.
    pub token_out: Address,
    /// Decimals of `token_in`.
    #[serde(default)]
    pub token_in_decimals: u8,
    /// Decimals of `token_out`.
    #[serde(default)]
    pub token_out_decimals: u8,
}

/// Price-protected converter routing through one swap pool.
pub struct SwapHelper<FI, FO, P> {
    address: Address,
    feed_in: FI,
    feed_out: FO,
    pool: P,
    route: SwapRoute,
    slippage: Slippage,
}

impl<FI, FO, P> SwapHelper<FI, FO, P>
where
    FI: PriceFeed,
    FO: PriceFeed,
    P: SwapPool,
{
    /// Create a helper; the route's tokens must both be traded by `pool`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::UnsupportedToken`] if the pool does not trade a route token
    pub fn new(
        address: Address,
        feed_in: FI,
        feed_out: FO,
        pool: P,
        route: SwapRoute,
        slippage: Slippage,
    ) -> Result<Self> {
        for token in [route.token_in, route.token_out] {
            if token != pool.token0() && token != pool.token1() {
                return Err(OracleError::UnsupportedToken {
                    pool: pool.address(),
                    token,
                });
            }
        }
        Ok(Self {
            address,
            feed_in,
            feed_out,
            pool,
            route,
            slippage,
        })
    }

    /// The configured slippage bound.
    pub fn slippage(&self) -> Slippage {
        self.slippage
    }

    /// Minimum acceptable output for `amount_in` at current feed prices.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidPrice`] if either feed reports zero
    /// - [`OracleError::Overflow`] on arithmetic overflow
    pub fn minimum_out(&self, amount_in: Amount) -> Result<Amount> {
        let price_in = positive_answer(&self.feed_in)?;
        let price_out = positive_answer(&self.feed_out)?;

        let up = i32::from(self.feed_out.decimals()) + i32::from(self.route.token_out_decimals);
        let down = i32::from(self.feed_in.decimals()) + i32::from(self.route.token_in_decimals);
        let scale = 10u128
            .checked_pow((up - down).unsigned_abs())
            .ok_or(OracleError::Overflow)?;

        let mut factor = price_in
            .checked_mul(self.slippage.numerator)
            .ok_or(OracleError::Overflow)?;
        let mut divisor = price_out
            .checked_mul(self.slippage.denominator)
            .ok_or(OracleError::Overflow)?;
        if up >= down {
            factor = factor.checked_mul(scale).ok_or(OracleError::Overflow)?;
        } else {
            divisor = divisor.checked_mul(scale).ok_or(OracleError::Overflow)?;
        }
        // `amount_in * factor` is carried in 256 bits
        mul_div_floor(amount_in, factor, divisor).ok_or(OracleError::Overflow)
    }

    /// Pool output for `amount_in` at the reserves as they are right now.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InsufficientLiquidity`] if a reserve is empty
    pub fn realized_out(&self, amount_in: Amount) -> Result<Amount> {
        let (reserve0, reserve1) = self.pool.reserves()?;
        let (reserve_in, reserve_out) = if self.route.token_in == self.pool.token0() {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };
        get_amount_out(amount_in, reserve_in, reserve_out, self.pool.fee_bps())
    }

    fn checked_quote(&self, amount_in: Amount) -> Result<Amount> {
        let minimum = self.minimum_out(amount_in)?;
        let realized = self.realized_out(amount_in)?;
        if realized < minimum {
            tracing::warn!(
                helper = %self.address,
                amount_in,
                minimum,
                realized,
                "swap refused: slippage bound exceeded"
            );
            return Err(OracleError::SlippageExceeded { minimum, realized });
        }
        Ok(realized)
    }
}

impl<FI, FO, P> Converter for SwapHelper<FI, FO, P>
where
    FI: PriceFeed,
    FO: PriceFeed,
    P: SwapPool,
{
    fn address(&self) -> Address {
        self.address
    }

    fn token_in(&self) -> Address {
        self.route.token_in
    }

    fn token_out(&self) -> Address {
        self.route.token_out
    }

    fn preview(&self, amount_in: Amount) -> Result<Amount> {
        if amount_in == 0 {
            return Ok(0);
        }
        self.checked_quote(amount_in)
    }

    fn convert(&mut self, amount_in: Amount, recipient: Address) -> Result<Amount> {
        if amount_in == 0 {
            return Ok(0);
        }
        let minimum = self.minimum_out(amount_in)?;
        let quoted = self.checked_quote(amount_in)?;
        let delivered = self
            .pool
            .swap(self.route.token_in, amount_in, quoted, recipient)?;
        if delivered < minimum {
            return Err(OracleError::SlippageExceeded {
                minimum,
                realized: delivered,
            });
        }

        tracing::debug!(
            helper = %self.address,
            amount_in,
            delivered,
            minimum,
            "interest converted"
        );

        Ok(delivered)
    }
}
