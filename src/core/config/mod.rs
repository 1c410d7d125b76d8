//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! gstack has two configuration scopes:
//! - **Global**: User-level output settings
//! - **Repo**: Repository-level defaults
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! The first that exists wins:
//! 1. `$GSTACK_CONFIG`
//! 2. `$XDG_CONFIG_HOME/gstack/config.toml`
//! 3. `~/.gstack/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use gstack::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! if config.quiet() {
//!     println!("quiet by default");
//! }
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::core::paths::StackPaths;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if in a repo and present)
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// With `paths`, also loads the repository's config file.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(paths: Option<&StackPaths>) -> Result<Self, ConfigError> {
        let global = Self::global_candidates().into_iter().find(|p| p.exists());
        let repo = paths
            .map(StackPaths::repo_config_path)
            .filter(|p| p.exists());
        Self::load_files(global.as_deref(), repo.as_deref())
    }

    /// Load from explicit files. `None` means defaults for that scope.
    pub fn load_files(global: Option<&Path>, repo: Option<&Path>) -> Result<Self, ConfigError> {
        let global_config = match global {
            Some(path) => read_toml::<GlobalConfig>(path)?,
            None => GlobalConfig::default(),
        };
        let repo_config = repo.map(read_toml::<RepoConfig>).transpose()?;
        if let Some(r) = &repo_config {
            r.validate()?;
        }

        debug!(global = ?global, repo = ?repo, "loaded config");
        Ok(Config {
            global: global_config,
            repo: repo_config,
            global_path: global.map(Path::to_path_buf),
            repo_path: repo.map(Path::to_path_buf),
        })
    }

    fn global_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var("GSTACK_CONFIG") {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("gstack/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".gstack/config.toml"));
        }
        candidates
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Configured trunk branch name, if any.
    pub fn trunk(&self) -> Option<&str> {
        self.repo.as_ref().and_then(|r| r.trunk.as_deref())
    }

    /// Quiet output by default. Defaults to `false`.
    pub fn quiet(&self) -> bool {
        self.global.quiet.unwrap_or(false)
    }

    /// Debug diagnostics by default. Defaults to `false`.
    pub fn debug(&self) -> bool {
        self.global.debug.unwrap_or(false)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
