//! `commit <allocations.json> [out.json]`
//!
//! Builds the epoch Merkle tree and emits the root, the share total and
//! one proof per beneficiary.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;

use harvest_crypto::merkle::MerkleTree;
use harvest_types::{hash_to_hex, Address, ShareUnits};

/// Published commitment for one epoch.
#[derive(Debug, Serialize)]
pub struct Commitment {
    pub root: String,
    pub total_shares: ShareUnits,
    pub claims: BTreeMap<String, ClaimEntry>,
}

/// One beneficiary's claim data.
#[derive(Debug, Serialize)]
pub struct ClaimEntry {
    pub share_units: ShareUnits,
    pub proof: Vec<String>,
}

/// Build the commitment for `allocations`.
pub fn build(allocations: &[(Address, ShareUnits)]) -> anyhow::Result<Commitment> {
    let tree = MerkleTree::from_allocations(allocations).context("building Merkle tree")?;
    if tree.total_shares() == 0 {
        bail!("allocation has zero total shares");
    }

    let mut claims = BTreeMap::new();
    for (beneficiary, shares) in tree.allocations() {
        let proof = tree
            .proof(beneficiary)
            .with_context(|| format!("proof for {beneficiary}"))?;
        claims.insert(
            beneficiary.to_string(),
            ClaimEntry {
                share_units: *shares,
                proof: proof.iter().map(hash_to_hex).collect(),
            },
        );
    }

    Ok(Commitment {
        root: hash_to_hex(&tree.root()),
        total_shares: tree.total_shares(),
        claims,
    })
}

pub fn run(args: &[String]) -> anyhow::Result<()> {
    let Some(input) = args.first() else {
        bail!("usage: harvest-keeper commit <allocations.json> [out.json]");
    };
    let allocations = super::read_allocations(Path::new(input))?;
    let commitment = build(&allocations)?;
    info!(
        root = %commitment.root,
        total_shares = commitment.total_shares,
        beneficiaries = commitment.claims.len(),
        "Commitment built"
    );

    let json = serde_json::to_string_pretty(&commitment)?;
    match args.get(1) {
        Some(out) => {
            std::fs::write(out, &json).with_context(|| format!("writing {out}"))?;
            eprintln!("Wrote commitment to {out}");
        }
        None => println!("{json}"),
    }
    Ok(())
}
