//! # harvest-oracle
//!
//! Price feeds and price-protected swaps.
//!
//! Pools may accrue interest in an asset other than the reward token. A
//! [`swap::SwapHelper`] converts such interest through a swap pool, refusing
//! any execution whose realized output falls below a reference derived from
//! two independent price feeds.
//!
//! ## Modules
//!
//! - [`feed`] — Price feed interface and a settable stub feed
//! - [`pool`] — Swap pool interface and an in-memory constant-product pair
//! - [`swap`] — Converter interface and the slippage-bounded swap helper
//! - [`stub`] — Fixed-ratio converter for trusted routes

pub mod feed;
pub mod pool;
pub mod stub;
pub mod swap;

use harvest_types::{Address, Amount};

/// Error types for price and swap operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// A feed reported a zero price.
    #[error("invalid price from feed {feed}: {answer}")]
    InvalidPrice {
        /// The feed that reported the price.
        feed: Address,
        /// The reported answer.
        answer: u128,
    },

    /// The slippage fraction is not in `(0, 1]`.
    #[error("invalid slippage bound {numerator}/{denominator}")]
    InvalidSlippage {
        /// Numerator of the acceptable ratio.
        numerator: u128,
        /// Denominator of the acceptable ratio.
        denominator: u128,
    },

    /// Realized output is below the minimum acceptable output.
    #[error("slippage exceeded: minimum {minimum}, realized {realized}")]
    SlippageExceeded {
        /// Minimum acceptable output.
        minimum: Amount,
        /// Output the pool would deliver (or delivered).
        realized: Amount,
    },

    /// The pool does not trade the given token.
    #[error("pool {pool} does not trade token {token}")]
    UnsupportedToken {
        /// The swap pool.
        pool: Address,
        /// The token that was offered.
        token: Address,
    },

    /// A pool side has no liquidity.
    #[error("insufficient liquidity: reserve_in {reserve_in}, reserve_out {reserve_out}")]
    InsufficientLiquidity {
        /// Reserve of the input token.
        reserve_in: Amount,
        /// Reserve of the output token.
        reserve_out: Amount,
    },

    /// The pool cannot deliver the requested output at current reserves.
    #[error("requested output {requested} exceeds available {available}")]
    ExcessiveOutput {
        /// Output requested by the caller.
        requested: Amount,
        /// Output the reserves support.
        available: Amount,
    },

    /// A collaborator (feed or pool) could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// Arithmetic overflow in price or swap math.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
