//! `pages <pool_count>`
//!
//! Prints the sequence of `collect_interest` calls covering every pool.

use std::ops::Range;

use anyhow::{bail, Context};

use crate::config::KeeperConfig;

/// Consecutive page ranges covering `0..pool_count`.
pub fn plan(pool_count: usize, page_size: usize) -> Vec<Range<usize>> {
    let step = page_size.max(1);
    (0..pool_count)
        .step_by(step)
        .map(|start| start..(start + step).min(pool_count))
        .collect()
}

pub fn run(config: &KeeperConfig, args: &[String]) -> anyhow::Result<()> {
    let Some(count) = args.first() else {
        bail!("usage: harvest-keeper pages <pool_count>");
    };
    let pool_count: usize = count.parse().context("invalid pool count")?;
    let page_size = config.page_size();

    let pages = plan(pool_count, page_size);
    if pages.is_empty() {
        println!("no pools to collect");
    }
    for page in &pages {
        println!(
            "collect_interest(epoch, {}, {})  # pools {}..{}",
            page.start, page_size, page.start, page.end
        );
    }
    Ok(())
}
