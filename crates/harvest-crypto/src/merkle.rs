//! Sorted-pair Merkle commitments over beneficiary allocations.
//!
//! Notes on construction:
//! - Leaves are `keccak256(address || uint256_be(share_units))`.
//! - Pairs are hashed in sorted order (lexicographically by 32-byte value),
//!   so a proof carries no left/right flags and stays valid whatever side
//!   each sibling sits on.
//! - Tree building sorts the leaves first and promotes an odd trailing node
//!   unchanged to the next level. Off-chain generators using the common
//!   "sorted" tree convention produce identical roots and proofs.

use std::collections::BTreeMap;

use harvest_types::{Address, Hash, ShareUnits};

use crate::keccak::{encode_packed_leaf, keccak256, keccak256_concat};
use crate::{CryptoError, Result};

/// Hash a beneficiary allocation into a leaf.
pub fn leaf_hash(beneficiary: &Address, share_units: ShareUnits) -> Hash {
    keccak256(&encode_packed_leaf(beneficiary, share_units))
}

/// Hash two sibling nodes, lower value first.
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    if a <= b {
        keccak256_concat(&[a.as_slice(), b.as_slice()])
    } else {
        keccak256_concat(&[b.as_slice(), a.as_slice()])
    }
}

/// Fold a proof onto a leaf, returning the implied root.
pub fn compute_root(leaf: Hash, proof: &[Hash]) -> Hash {
    proof.iter().fold(leaf, |acc, node| hash_pair(&acc, node))
}

/// Verify that `leaf` is committed under `root`.
///
/// Pure and side-effect free; safe for pre-flight checks.
pub fn verify(root: &Hash, leaf: Hash, proof: &[Hash]) -> bool {
    compute_root(leaf, proof) == *root
}

/// Verify a `(beneficiary, share_units)` claim against `root`.
pub fn verify_claim(
    root: &Hash,
    beneficiary: &Address,
    share_units: ShareUnits,
    proof: &[Hash],
) -> bool {
    verify(root, leaf_hash(beneficiary, share_units), proof)
}

/// A complete Merkle tree built from an epoch allocation.
///
/// Used off-chain by the oracle to publish a root and hand out proofs.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `layers[0]` holds the sorted leaves; the last layer holds the root.
    layers: Vec<Vec<Hash>>,
    allocations: BTreeMap<Address, ShareUnits>,
    total_shares: ShareUnits,
}

impl MerkleTree {
    /// Build a tree from `(beneficiary, share_units)` pairs.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::EmptyAllocation`] if `allocations` is empty
    /// - [`CryptoError::DuplicateBeneficiary`] if a beneficiary repeats
    /// - [`CryptoError::ShareOverflow`] if the share total overflows
    pub fn from_allocations(allocations: &[(Address, ShareUnits)]) -> Result<Self> {
        if allocations.is_empty() {
            return Err(CryptoError::EmptyAllocation);
        }

        let mut by_beneficiary = BTreeMap::new();
        let mut total_shares: ShareUnits = 0;
        for (beneficiary, shares) in allocations {
            if by_beneficiary.insert(*beneficiary, *shares).is_some() {
                return Err(CryptoError::DuplicateBeneficiary(*beneficiary));
            }
            total_shares = total_shares
                .checked_add(*shares)
                .ok_or(CryptoError::ShareOverflow)?;
        }

        let mut leaves: Vec<Hash> = by_beneficiary
            .iter()
            .map(|(beneficiary, shares)| leaf_hash(beneficiary, *shares))
            .collect();
        leaves.sort_unstable();

        let mut layers = vec![leaves];
        while let Some(level) = layers.last() {
            if level.len() <= 1 {
                break;
            }
            let next: Vec<Hash> = level
                .chunks(2)
                .map(|pair| match pair.get(1) {
                    Some(right) => hash_pair(&pair[0], right),
                    None => pair[0],
                })
                .collect();
            layers.push(next);
        }

        Ok(Self {
            layers,
            allocations: by_beneficiary,
            total_shares,
        })
    }

    /// The commitment root.
    pub fn root(&self) -> Hash {
        self.layers
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Sum of all share units in the allocation.
    pub fn total_shares(&self) -> ShareUnits {
        self.total_shares
    }

    /// Number of beneficiaries.
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    /// Whether the tree has no beneficiaries (never true once built).
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Share units allocated to `beneficiary`.
    pub fn shares_of(&self, beneficiary: &Address) -> Option<ShareUnits> {
        self.allocations.get(beneficiary).copied()
    }

    /// Beneficiaries and their share units, ordered by address.
    pub fn allocations(&self) -> impl Iterator<Item = (&Address, &ShareUnits)> {
        self.allocations.iter()
    }

    /// Sorted leaf hashes.
    pub fn leaves(&self) -> &[Hash] {
        self.layers.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Authentication path for `beneficiary`, leaf level first.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::UnknownBeneficiary`] if the beneficiary is not allocated
    pub fn proof(&self, beneficiary: &Address) -> Result<Vec<Hash>> {
        let shares = self
            .shares_of(beneficiary)
            .ok_or(CryptoError::UnknownBeneficiary(*beneficiary))?;
        let leaf = leaf_hash(beneficiary, shares);
        let mut index = self
            .leaves()
            .binary_search(&leaf)
            .map_err(|_| CryptoError::UnknownBeneficiary(*beneficiary))?;

        let mut proof = Vec::with_capacity(self.layers.len());
        for level in &self.layers[..self.layers.len() - 1] {
            let sibling = if index % 2 == 1 { index - 1 } else { index + 1 };
            if let Some(node) = level.get(sibling) {
                proof.push(*node);
            }
            index /= 2;
        }
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation(n: u64) -> Vec<(Address, ShareUnits)> {
        (1..=n)
            .map(|i| (Address::from_low_u64(i), u128::from(i) * 100))
            .collect()
    }

    #[test]
    fn test_hash_pair_is_order_independent() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let alloc = allocation(1);
        let tree = MerkleTree::from_allocations(&alloc).expect("build");
        assert_eq!(tree.root(), leaf_hash(&alloc[0].0, alloc[0].1));
        let proof = tree.proof(&alloc[0].0).expect("proof");
        assert!(proof.is_empty());
        assert!(verify_claim(&tree.root(), &alloc[0].0, alloc[0].1, &proof));
    }

    #[test]
    fn test_two_leaf_root() {
        let alloc = allocation(2);
        let tree = MerkleTree::from_allocations(&alloc).expect("build");
        let l0 = leaf_hash(&alloc[0].0, alloc[0].1);
        let l1 = leaf_hash(&alloc[1].0, alloc[1].1);
        assert_eq!(tree.root(), hash_pair(&l0, &l1));
    }

    #[test]
    fn test_every_proof_verifies() {
        for n in [2u64, 3, 4, 5, 7, 8, 13] {
            let alloc = allocation(n);
            let tree = MerkleTree::from_allocations(&alloc).expect("build");
            for (beneficiary, shares) in &alloc {
                let proof = tree.proof(beneficiary).expect("proof");
                assert!(
                    verify_claim(&tree.root(), beneficiary, *shares, &proof),
                    "proof for {beneficiary} in tree of {n} must verify"
                );
            }
        }
    }

    #[test]
    fn test_odd_node_promoted() {
        let alloc = allocation(3);
        let tree = MerkleTree::from_allocations(&alloc).expect("build");
        let leaves = tree.leaves().to_vec();
        let expected = hash_pair(&hash_pair(&leaves[0], &leaves[1]), &leaves[2]);
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_tampered_shares_rejected() {
        let alloc = allocation(4);
        let tree = MerkleTree::from_allocations(&alloc).expect("build");
        for (beneficiary, shares) in &alloc {
            let proof = tree.proof(beneficiary).expect("proof");
            assert!(!verify_claim(&tree.root(), beneficiary, shares * 2, &proof));
            assert!(!verify_claim(&tree.root(), beneficiary, shares + 1, &proof));
        }
    }

    #[test]
    fn test_wrong_beneficiary_rejected() {
        let alloc = allocation(4);
        let tree = MerkleTree::from_allocations(&alloc).expect("build");
        let proof = tree.proof(&alloc[0].0).expect("proof");
        assert!(!verify_claim(&tree.root(), &alloc[1].0, alloc[0].1, &proof));
    }

    #[test]
    fn test_input_order_does_not_change_root() {
        let alloc = allocation(6);
        let mut reversed = alloc.clone();
        reversed.reverse();
        let a = MerkleTree::from_allocations(&alloc).expect("build");
        let b = MerkleTree::from_allocations(&reversed).expect("build");
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_total_shares() {
        let tree = MerkleTree::from_allocations(&allocation(4)).expect("build");
        assert_eq!(tree.total_shares(), 1000);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_empty_allocation_rejected() {
        assert!(matches!(
            MerkleTree::from_allocations(&[]),
            Err(CryptoError::EmptyAllocation)
        ));
    }

    #[test]
    fn test_duplicate_beneficiary_rejected() {
        let addr = Address::from_low_u64(1);
        assert!(matches!(
            MerkleTree::from_allocations(&[(addr, 1), (addr, 2)]),
            Err(CryptoError::DuplicateBeneficiary(a)) if a == addr
        ));
    }

    #[test]
    fn test_unknown_beneficiary_proof() {
        let tree = MerkleTree::from_allocations(&allocation(2)).expect("build");
        assert!(tree.proof(&Address::from_low_u64(99)).is_err());
    }
}
