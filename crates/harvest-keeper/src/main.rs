//! harvest-keeper: off-chain tooling for the oracle account.
//!
//! Builds epoch commitments from allocation files, checks claim proofs and
//! plans collection pages. `dry-run` simulates a whole epoch in memory.
//!
//! Usage:
//!   harvest-keeper commit <allocations.json> [out.json]
//!   harvest-keeper verify <root> <address> <shares> [proof...]
//!   harvest-keeper pages <pool_count>
//!   harvest-keeper dry-run <allocations.json> <pool_count> <interest_per_pool>

mod commands;
mod config;

use tracing::{debug, info};
use tracing_subscriber::filter::{Directive, EnvFilter};

use crate::config::KeeperConfig;

const USAGE: &str = "usage: harvest-keeper <commit|verify|pages|dry-run> [args...]";

fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = KeeperConfig::load()?;

    // 2. Initialize tracing; RUST_LOG wins over the configured level
    let default_directive: Directive = config.keeper.log_level.parse()?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_directive)
                .from_env_lossy(),
        )
        .init();

    debug!(?config, "Configuration loaded");

    // 3. Dispatch
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    match command.as_str() {
        "commit" => commands::commit::run(rest),
        "verify" => {
            if !commands::verify::run(rest)? {
                std::process::exit(1);
            }
            Ok(())
        }
        "pages" => commands::pages::run(&config, rest),
        "dry-run" => {
            info!("Running dry-run epoch");
            commands::dry_run::run(&config, rest)
        }
        other => {
            eprintln!("unknown command: {other}\n{USAGE}");
            std::process::exit(2);
        }
    }
}
