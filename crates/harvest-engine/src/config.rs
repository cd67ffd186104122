//! Engine configuration and authority.
//!
//! The admin and oracle accounts are explicit state checked on every
//! privileged call. The admin manages pools, the reward token and both
//! accounts; the oracle defines, collects and finalizes epochs and pushes
//! payouts.

use std::fmt;

use serde::{Deserialize, Serialize};

use harvest_types::Address;

use crate::{EngineError, Result};

/// Default number of pools processed per collection page.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Privileged roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Oracle,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Oracle => f.write_str("oracle"),
        }
    }
}

/// The accounts holding each role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub admin: Address,
    pub oracle: Address,
}

impl Authority {
    /// Account currently holding `role`.
    pub fn holder(&self, role: Role) -> Address {
        match role {
            Role::Admin => self.admin,
            Role::Oracle => self.oracle,
        }
    }

    /// Fail unless `caller` holds `role`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] if `caller` is not the role holder
    pub fn require(&self, role: Role, caller: Address) -> Result<()> {
        if self.holder(role) != caller {
            return Err(EngineError::Unauthorized { role, caller });
        }
        Ok(())
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Admin account (pools, reward token, account rotation).
    #[serde(default)]
    pub admin: Address,
    /// Oracle account (epoch lifecycle, push payouts).
    #[serde(default)]
    pub oracle: Address,
    /// The engine's own account; swap output is delivered here.
    #[serde(default)]
    pub engine_account: Address,
    /// Initial reward token.
    #[serde(default)]
    pub reward_token: Address,
    /// Upper bound on pools processed per collection call.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_max_page_size() -> usize {
    DEFAULT_MAX_PAGE_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: Address::ZERO,
            oracle: Address::ZERO,
            engine_account: Address::ZERO,
            reward_token: Address::ZERO,
            max_page_size: default_max_page_size(),
        }
    }
}

impl EngineConfig {
    /// Configuration with the given accounts and default limits.
    pub fn new(admin: Address, oracle: Address, reward_token: Address) -> Self {
        Self {
            admin,
            oracle,
            reward_token,
            ..Self::default()
        }
    }

    /// Check the configuration before building an engine.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidConfiguration`] if an account or the reward
    ///   token is zero, or the page size is zero
    pub fn validate(&self) -> Result<()> {
        if self.admin.is_zero() {
            return Err(EngineError::InvalidConfiguration(
                "admin account is zero".to_string(),
            ));
        }
        if self.oracle.is_zero() {
            return Err(EngineError::InvalidConfiguration(
                "oracle account is zero".to_string(),
            ));
        }
        if self.reward_token.is_zero() {
            return Err(EngineError::InvalidConfiguration(
                "reward token is zero".to_string(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(EngineError::InvalidConfiguration(
                "max_page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured authority.
    pub fn authority(&self) -> Authority {
        Authority {
            admin: self.admin,
            oracle: self.oracle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        let config = EngineConfig::new(addr(1), addr(2), addr(3));
        config.validate().expect("valid");
        assert_eq!(config.authority().oracle, addr(2));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = EngineConfig {
            max_page_size: 0,
            ..EngineConfig::new(addr(1), addr(2), addr(3))
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_authority_require() {
        let auth = Authority {
            admin: addr(1),
            oracle: addr(2),
        };
        auth.require(Role::Admin, addr(1)).expect("admin");
        auth.require(Role::Oracle, addr(2)).expect("oracle");
        let err = auth.require(Role::Oracle, addr(1)).expect_err("admin is not oracle");
        assert!(matches!(
            err,
            EngineError::Unauthorized { role: Role::Oracle, .. }
        ));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::Oracle.to_string(), "oracle");
    }
}
