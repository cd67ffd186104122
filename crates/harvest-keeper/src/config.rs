//! Keeper configuration file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use harvest_engine::EngineConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HARVEST_CONFIG";

/// Config file looked up in the working directory otherwise.
pub const DEFAULT_CONFIG_FILE: &str = "harvest.toml";

/// Complete keeper configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Engine accounts and limits.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Keeper runtime settings.
    #[serde(default)]
    pub keeper: KeeperSettings,
}

/// Keeper runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperSettings {
    /// Default tracing directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Pools per collection call.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> usize {
    100
}

impl Default for KeeperSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            page_size: default_page_size(),
        }
    }
}

impl KeeperConfig {
    /// Load configuration from `HARVEST_CONFIG` or `./harvest.toml`.
    ///
    /// Falls back to defaults if neither exists.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Effective page size: the keeper setting capped by the engine limit.
    pub fn page_size(&self) -> usize {
        self.keeper.page_size.min(self.engine.max_page_size).max(1)
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_types::Address;

    #[test]
    fn test_default_config() {
        let config = KeeperConfig::default();
        assert_eq!(config.keeper.log_level, "info");
        assert_eq!(config.keeper.page_size, 100);
        assert_eq!(config.engine.max_page_size, 100);
        assert_eq!(config.page_size(), 100);
    }

    #[test]
    fn test_parse_partial() {
        let config = KeeperConfig::parse(
            r#"
            [engine]
            admin = "0x0000000000000000000000000000000000000001"
            oracle = "0x0000000000000000000000000000000000000002"
            max_page_size = 25

            [keeper]
            log_level = "debug"
            "#,
        )
        .expect("parse");
        assert_eq!(config.engine.admin, Address::from_low_u64(1));
        assert_eq!(config.engine.oracle, Address::from_low_u64(2));
        assert!(config.engine.reward_token.is_zero());
        assert_eq!(config.keeper.log_level, "debug");
        assert_eq!(config.page_size(), 25);
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        assert!(KeeperConfig::parse("[engine]\nadmin = \"0x12\"\n").is_err());
    }

    #[test]
    fn test_empty_document() {
        let config = KeeperConfig::parse("").expect("parse");
        assert_eq!(config.keeper.page_size, 100);
    }
}
