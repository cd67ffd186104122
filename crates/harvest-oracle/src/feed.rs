//! Price feed interface.
//!
//! A feed reports the current price of one asset as a scaled integer
//! (`answer / 10^decimals`). Both sides of a swap are priced in the same
//! quote currency, so only their ratio matters.

use std::cell::Cell;
use std::rc::Rc;

use harvest_types::Address;

use crate::{OracleError, Result};

/// Default feed precision (8 decimals, the usual USD feed scale).
pub const DEFAULT_FEED_DECIMALS: u8 = 8;

/// A source of the current price of one asset.
pub trait PriceFeed {
    /// Feed identity.
    fn address(&self) -> Address;

    /// Number of decimals in [`latest_answer`](PriceFeed::latest_answer).
    fn decimals(&self) -> u8;

    /// The most recent price.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unavailable`] if the feed cannot be read
    fn latest_answer(&self) -> Result<u128>;
}

/// A settable feed.
///
/// Clones share the same answer, so a test or simulation can keep a handle
/// and move the price after the feed has been handed to a swap helper.
#[derive(Debug, Clone)]
pub struct StubFeed {
    address: Address,
    decimals: u8,
    answer: Rc<Cell<Option<u128>>>,
}

impl StubFeed {
    /// Create a feed with the default precision.
    pub fn new(address: Address, answer: u128) -> Self {
        Self::with_decimals(address, answer, DEFAULT_FEED_DECIMALS)
    }

    /// Create a feed with a custom precision.
    pub fn with_decimals(address: Address, answer: u128, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            answer: Rc::new(Cell::new(Some(answer))),
        }
    }

    /// Move the price.
    pub fn set_answer(&self, answer: u128) {
        tracing::debug!(feed = %self.address, answer, "stub feed: answer changed");
        self.answer.set(Some(answer));
    }

    /// Take the feed offline; reads fail until the next `set_answer`.
    pub fn set_unavailable(&self) {
        self.answer.set(None);
    }
}

impl PriceFeed for StubFeed {
    fn address(&self) -> Address {
        self.address
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn latest_answer(&self) -> Result<u128> {
        self.answer
            .get()
            .ok_or_else(|| OracleError::Unavailable(format!("feed {} offline", self.address)))
    }
}

/// Read a feed and reject a zero price.
pub(crate) fn positive_answer(feed: &dyn PriceFeed) -> Result<u128> {
    let answer = feed.latest_answer()?;
    if answer == 0 {
        return Err(OracleError::InvalidPrice {
            feed: feed.address(),
            answer,
        });
    }
    Ok(answer)
}
