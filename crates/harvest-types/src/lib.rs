//! # harvest-types
//!
//! Shared domain types used across the Harvest workspace: account addresses,
//! hash and amount aliases, full-width amount arithmetic, and the audit
//! events emitted by the distribution engine.

pub mod address;
pub mod events;
pub mod math;

pub use address::Address;

/// 32-byte digest (Keccak-256 output, Merkle nodes and roots).
pub type Hash = [u8; 32];

/// Token amount in the token's smallest unit.
pub type Amount = u128;

/// Beneficiary share units committed in an epoch allocation.
pub type ShareUnits = u128;

/// Sequential epoch identifier, starting at 0.
pub type EpochId = u64;

/// Stable, append-only index of a registered pool.
pub type PoolId = usize;

/// Errors produced while parsing shared types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// Address string is not `0x` followed by 40 hex digits.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Hash string is not `0x` followed by 64 hex digits.
    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

/// Render a 32-byte hash as `0x`-prefixed lowercase hex.
pub fn hash_to_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parse a `0x`-prefixed (or bare) 64-digit hex string into a hash.
///
/// # Errors
///
/// - [`TypesError::InvalidHash`] if the string is not exactly 32 bytes of hex
pub fn hash_from_hex(s: &str) -> Result<Hash, TypesError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|_| TypesError::InvalidHash(s.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| TypesError::InvalidHash(s.to_string()))
}
