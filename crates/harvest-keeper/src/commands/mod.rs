//! Keeper subcommands.
//!
//! Each submodule implements one subcommand.

pub mod commit;
pub mod dry_run;
pub mod pages;
pub mod verify;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde_json::Value;

use harvest_types::{Address, ShareUnits};

/// Parse an allocation document of the form `{"0xaddress": shares}`.
///
/// Shares may be JSON integers or decimal strings (for values beyond
/// 2^53 that some producers cannot emit as numbers).
pub fn parse_allocations(content: &str) -> anyhow::Result<Vec<(Address, ShareUnits)>> {
    let raw: BTreeMap<String, Value> =
        serde_json::from_str(content).context("allocation file must be a JSON object")?;
    if raw.is_empty() {
        bail!("allocation file is empty");
    }

    raw.iter()
        .map(|(key, value)| -> anyhow::Result<(Address, ShareUnits)> {
            let beneficiary: Address = key
                .parse()
                .with_context(|| format!("invalid beneficiary address {key}"))?;
            let shares = match value {
                Value::Number(n) => n
                    .as_u64()
                    .map(u128::from)
                    .ok_or_else(|| anyhow!("shares for {key} must be a non-negative integer"))?,
                Value::String(s) => s
                    .parse::<u128>()
                    .with_context(|| format!("shares for {key} must be an integer"))?,
                _ => bail!("shares for {key} must be a number"),
            };
            Ok((beneficiary, shares))
        })
        .collect()
}

/// Read and parse an allocation file.
pub fn read_allocations(path: &Path) -> anyhow::Result<Vec<(Address, ShareUnits)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading allocation file {}", path.display()))?;
    parse_allocations(&content)
}
