//! # harvest-engine
//!
//! Epoch distribution engine.
//!
//! The engine walks a registry of interest-bearing pools in pages, converts
//! what it collects into a single reward token, and settles the reward per
//! epoch either through beneficiary-submitted Merkle proofs or through an
//! oracle-pushed payout list.
//!
//! ## Modules
//!
//! - [`config`] — Engine configuration and the admin/oracle authority
//! - [`source`] — Pool adapter interface and an in-memory accruing pool
//! - [`registry`] — Append-only pool registry with per-pool swap paths
//! - [`epoch`] — Epoch records and collection paging rules
//! - [`claims`] — Claim ledger and settlement records
//! - [`treasury`] — Engine-held balances and paid-out totals
//! - [`engine`] — The orchestrating state machine
//! - [`snapshot`] — Serializable view of the persisted state

pub mod claims;
pub mod config;
pub mod engine;
pub mod epoch;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod treasury;

pub use config::{Authority, EngineConfig, Role};
pub use engine::{DistributionEngine, PageReport};

use harvest_oracle::OracleError;
use harvest_types::{Address, Amount, EpochId, PoolId, ShareUnits};

use crate::source::SourceError;

/// Broad failure classes every [`EngineError`] falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong admin or oracle account.
    Authorization,
    /// Operation invalid for the current epoch or registry state.
    State,
    /// Merkle verification failed.
    ProofInvalid,
    /// Entitlement already settled.
    AlreadyClaimed,
    /// Swap execution outside the configured bound.
    SlippageExceeded,
    /// Payout exceeds the held balance.
    InsufficientBalance,
    /// Collection page out of sequence or oversized.
    PaginationMismatch,
    /// A pool adapter or swap collaborator failed.
    Adapter,
    /// Arithmetic overflow.
    Overflow,
    /// Invalid configuration or arguments.
    Configuration,
}

/// Error types for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller does not hold the required role.
    #[error("{caller} is not the {role} account")]
    Unauthorized {
        /// Role the operation requires.
        role: Role,
        /// Account that attempted the call.
        caller: Address,
    },

    /// An epoch is already open; finalize it before defining another.
    #[error("epoch {epoch_id} is still open")]
    EpochAlreadyOpen {
        /// The open epoch.
        epoch_id: EpochId,
    },

    /// There is no open epoch.
    #[error("no open epoch")]
    NoOpenEpoch,

    /// The epoch exists but is not the open one.
    #[error("epoch {epoch_id} is not open")]
    EpochNotOpen {
        /// The requested epoch.
        epoch_id: EpochId,
    },

    /// The epoch has never been defined.
    #[error("unknown epoch {epoch_id}")]
    UnknownEpoch {
        /// The requested epoch.
        epoch_id: EpochId,
    },

    /// Claims require a finalized epoch.
    #[error("epoch {epoch_id} is not finalized")]
    EpochNotFinalized {
        /// The requested epoch.
        epoch_id: EpochId,
    },

    /// Finalization before every pool was collected.
    #[error("epoch {epoch_id} collected {cursor} of {pool_count} pools")]
    CollectionIncomplete {
        /// The open epoch.
        epoch_id: EpochId,
        /// Pools processed so far.
        cursor: usize,
        /// Pools registered.
        pool_count: usize,
    },

    /// The epoch is settled by a different mechanism.
    #[error("epoch {epoch_id} is not a {expected}-mode epoch")]
    WrongMode {
        /// The requested epoch.
        epoch_id: EpochId,
        /// Mode the operation requires.
        expected: &'static str,
    },

    /// The reward token cannot change while an epoch is collecting.
    #[error("reward token locked while epoch {epoch_id} is collecting")]
    RewardTokenLocked {
        /// The collecting epoch.
        epoch_id: EpochId,
    },

    /// A pool's conversion path does not end in the reward token.
    #[error("pool {pool_id} yields {actual}, reward token is {expected}")]
    RewardAssetMismatch {
        /// The pool.
        pool_id: PoolId,
        /// Current reward token.
        expected: Address,
        /// Token the pool path produces.
        actual: Address,
    },

    /// No pool with this index.
    #[error("unknown pool {pool_id}")]
    UnknownPool {
        /// The requested pool.
        pool_id: PoolId,
    },

    /// The pool address is already registered.
    #[error("pool {pool} already registered as {pool_id}")]
    DuplicatePool {
        /// Pool address.
        pool: Address,
        /// Existing index.
        pool_id: PoolId,
    },

    /// The swap helper does not consume the pool's interest token.
    #[error("helper consumes {helper_token}, pool yields {pool_token}")]
    HelperMismatch {
        /// Token the pool yields.
        pool_token: Address,
        /// Token the helper consumes.
        helper_token: Address,
    },

    /// Invalid configuration or argument.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The Merkle proof does not match the epoch commitment.
    #[error("invalid proof for {beneficiary} in epoch {epoch_id}")]
    InvalidProof {
        /// The epoch.
        epoch_id: EpochId,
        /// The claimant.
        beneficiary: Address,
    },

    /// The entitlement was already settled.
    #[error("{beneficiary} already claimed epoch {epoch_id}")]
    AlreadyClaimed {
        /// The epoch.
        epoch_id: EpochId,
        /// The claimant.
        beneficiary: Address,
    },

    /// A claim would push the epoch's payouts past its collected reward.
    #[error("epoch {epoch_id} has {remaining} left, claim requires {required}")]
    EpochExhausted {
        /// The epoch.
        epoch_id: EpochId,
        /// Amount the claim would pay.
        required: Amount,
        /// Reward not yet paid out.
        remaining: Amount,
    },

    /// A claim carries more shares than the epoch committed in total.
    #[error("claim for {share_units} shares exceeds epoch {epoch_id} total {total_shares}")]
    SharesExceedTotal {
        /// The epoch.
        epoch_id: EpochId,
        /// Shares claimed.
        share_units: ShareUnits,
        /// Shares committed for the epoch.
        total_shares: ShareUnits,
    },

    /// Payout exceeds what the engine holds.
    #[error("insufficient {token} balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Token to pay.
        token: Address,
        /// Amount required.
        required: Amount,
        /// Amount held.
        available: Amount,
    },

    /// The page does not start at the collection cursor.
    #[error("page starting at {start} does not match cursor {cursor} of epoch {epoch_id}")]
    PaginationMismatch {
        /// The epoch.
        epoch_id: EpochId,
        /// Requested page start.
        start: usize,
        /// Current cursor.
        cursor: usize,
    },

    /// The page is larger than the configured maximum.
    #[error("page of {count} pools exceeds maximum {max}")]
    PageTooLarge {
        /// Requested page size.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A swap helper refused or failed the conversion.
    #[error("swap for pool {pool_id} failed: {source}")]
    Swap {
        /// The pool.
        pool_id: PoolId,
        /// Underlying swap failure.
        source: OracleError,
    },

    /// A pool adapter failed.
    #[error("pool {pool_id} adapter failed: {source}")]
    Source {
        /// The pool.
        pool_id: PoolId,
        /// Underlying adapter failure.
        source: SourceError,
    },

    /// Arithmetic overflow.
    #[error("arithmetic overflow")]
    Overflow,
}

impl EngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Unauthorized { .. } => ErrorKind::Authorization,
            EngineError::EpochAlreadyOpen { .. }
            | EngineError::NoOpenEpoch
            | EngineError::EpochNotOpen { .. }
            | EngineError::UnknownEpoch { .. }
            | EngineError::EpochNotFinalized { .. }
            | EngineError::CollectionIncomplete { .. }
            | EngineError::WrongMode { .. }
            | EngineError::RewardTokenLocked { .. }
            | EngineError::RewardAssetMismatch { .. }
            | EngineError::UnknownPool { .. }
            | EngineError::DuplicatePool { .. }
            | EngineError::SharesExceedTotal { .. } => ErrorKind::State,
            EngineError::HelperMismatch { .. } | EngineError::InvalidConfiguration(_) => {
                ErrorKind::Configuration
            }
            EngineError::InvalidProof { .. } => ErrorKind::ProofInvalid,
            EngineError::AlreadyClaimed { .. } => ErrorKind::AlreadyClaimed,
            EngineError::InsufficientBalance { .. } | EngineError::EpochExhausted { .. } => {
                ErrorKind::InsufficientBalance
            }
            EngineError::PaginationMismatch { .. } | EngineError::PageTooLarge { .. } => {
                ErrorKind::PaginationMismatch
            }
            EngineError::Swap {
                source: OracleError::SlippageExceeded { .. },
                ..
            } => ErrorKind::SlippageExceeded,
            EngineError::Swap { .. } | EngineError::Source { .. } => ErrorKind::Adapter,
            EngineError::Overflow => ErrorKind::Overflow,
        }
    }
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
