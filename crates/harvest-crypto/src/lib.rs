//! # harvest-crypto
//!
//! Hashing and commitment primitives for the Harvest distribution engine.
//!
//! The suite is fixed: Keccak-256 everywhere, Ethereum `encodePacked` leaf
//! layout, and sorted-pair Merkle trees, so commitments built by off-chain
//! tooling verify byte-for-byte inside the engine.
//!
//! ## Modules
//!
//! - [`keccak`] — Keccak-256 and packed leaf encoding
//! - [`merkle`] — Sorted-pair Merkle verification and tree construction

pub mod keccak;
pub mod merkle;

use harvest_types::Address;

/// Error types for commitment construction.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A tree cannot be built from zero allocations.
    #[error("allocation set is empty")]
    EmptyAllocation,

    /// The same beneficiary appears twice in one allocation set.
    #[error("duplicate beneficiary in allocation: {0}")]
    DuplicateBeneficiary(Address),

    /// Share units across the allocation overflowed.
    #[error("share total overflow")]
    ShareOverflow,

    /// The requested beneficiary is not part of the tree.
    #[error("beneficiary not in allocation: {0}")]
    UnknownBeneficiary(Address),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
