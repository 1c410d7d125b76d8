//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$GSTACK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gstack/config.toml`
//! 3. `~/.gstack/config.toml`
//!
//! # Repo Config
//!
//! Located at `<common git dir>/gstack/config.toml`, shared by every
//! worktree of the repository.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., trunk must be a valid branch name).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// quiet = false
/// debug = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Suppress non-essential output
    pub quiet: Option<bool>,

    /// Emit debug diagnostics
    pub debug: Option<bool>,
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// trunk = "main"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Trunk branch name used by `init` when none is given
    pub trunk: Option<String>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(trunk) = &self.trunk {
            BranchName::new(trunk).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid trunk branch name: {}", e))
            })?;
        }
        Ok(())
    }
}
