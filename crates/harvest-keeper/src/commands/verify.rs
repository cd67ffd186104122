//! `verify <root> <address> <shares> [proof...]`

use anyhow::{bail, Context};

use harvest_crypto::merkle::verify_claim;
use harvest_types::{hash_from_hex, Address, Hash, ShareUnits};

/// A parsed verification request.
#[derive(Debug)]
pub struct Request {
    pub root: Hash,
    pub beneficiary: Address,
    pub share_units: ShareUnits,
    pub proof: Vec<Hash>,
}

pub fn parse(args: &[String]) -> anyhow::Result<Request> {
    let [root, beneficiary, shares, proof @ ..] = args else {
        bail!("usage: harvest-keeper verify <root> <address> <shares> [proof...]");
    };
    let root = hash_from_hex(root).context("invalid root")?;
    let beneficiary: Address = beneficiary.parse().context("invalid address")?;
    let share_units: ShareUnits = shares.parse().context("invalid share count")?;
    let proof = proof
        .iter()
        .map(|h| hash_from_hex(h).with_context(|| format!("invalid proof element {h}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Request {
        root,
        beneficiary,
        share_units,
        proof,
    })
}

/// Print whether the claim verifies; returns the verdict.
pub fn run(args: &[String]) -> anyhow::Result<bool> {
    let request = parse(args)?;
    let valid = verify_claim(
        &request.root,
        &request.beneficiary,
        request.share_units,
        &request.proof,
    );
    println!("{}", if valid { "valid" } else { "invalid" });
    Ok(valid)
}
