//! Keccak-256 hashing and packed leaf encoding.
//!
//! Leaves use the Ethereum `encodePacked(address, uint256)` layout:
//! the 20 address bytes followed by the share units as a 32-byte big-endian
//! integer. No length prefixes, no padding between fields.

use sha3::{Digest, Keccak256};

use harvest_types::address::ADDRESS_LEN;
use harvest_types::{Address, Hash, ShareUnits};

/// Width of an encoded `uint256`.
pub const UINT256_LEN: usize = 32;

/// Length of a packed `(address, uint256)` leaf preimage.
pub const PACKED_LEAF_LEN: usize = ADDRESS_LEN + UINT256_LEN;

/// Compute the Keccak-256 hash of the input data.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    finish(hasher)
}

/// Compute Keccak-256 over the concatenation of several slices.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    finish(hasher)
}

fn finish(hasher: Keccak256) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Encode an integer as a big-endian `uint256`.
pub fn encode_uint256(value: u128) -> [u8; UINT256_LEN] {
    let mut out = [0u8; UINT256_LEN];
    out[UINT256_LEN - 16..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Packed `(address, uint256)` preimage of a beneficiary leaf.
pub fn encode_packed_leaf(beneficiary: &Address, share_units: ShareUnits) -> [u8; PACKED_LEAF_LEN] {
    let mut out = [0u8; PACKED_LEAF_LEN];
    out[..ADDRESS_LEN].copy_from_slice(beneficiary.as_bytes());
    out[ADDRESS_LEN..].copy_from_slice(&encode_uint256(share_units));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_keccak_empty_vector() {
        assert_eq!(
            keccak256(b""),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn test_concat_matches_single_buffer() {
        let joined = keccak256(b"helloworld");
        assert_eq!(keccak256_concat(&[b"hello".as_slice(), b"world".as_slice()]), joined);
    }

    #[test]
    fn test_uint256_is_big_endian() {
        let encoded = encode_uint256(0x0102);
        assert_eq!(&encoded[..30], &[0u8; 30]);
        assert_eq!(&encoded[30..], &[0x01, 0x02]);
    }

    #[test]
    fn test_packed_leaf_layout() {
        let addr = Address::from_low_u64(0xAA);
        let packed = encode_packed_leaf(&addr, 100);
        assert_eq!(packed.len(), 52);
        assert_eq!(&packed[..20], addr.as_bytes());
        assert_eq!(packed[51], 100);
        assert_eq!(&packed[20..51], &[0u8; 31]);
    }
}
