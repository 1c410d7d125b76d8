//! core::paths
//!
//! Where gstack keeps files inside a repository.
//!
//! Repo-scoped files live under `<common_dir>/gstack/`, so every linked
//! worktree of a repository sees the same ones. Nothing else in the crate
//! joins `"gstack"` onto a git directory.
//!
//! Stack state itself is not a file; it lives under a ref (see
//! [`crate::core::state::STATE_REF`]).
//!
//! # Example
//!
//! ```
//! use gstack::core::paths::StackPaths;
//! use std::path::PathBuf;
//!
//! let paths = StackPaths::new(
//!     PathBuf::from("/repo/.git/worktrees/feature"),
//!     PathBuf::from("/repo/.git"),
//! );
//!
//! assert_eq!(
//!     paths.repo_config_path(),
//!     PathBuf::from("/repo/.git/gstack/config.toml")
//! );
//! ```

use std::path::PathBuf;

use crate::git::RepoInfo;

/// Path routing for gstack's repo-scoped files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPaths {
    /// Per-worktree git directory.
    pub git_dir: PathBuf,
    /// Git directory shared by all worktrees.
    pub common_dir: PathBuf,
}

impl StackPaths {
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Paths for an opened repository.
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self::new(info.git_dir.clone(), info.common_dir.clone())
    }

    /// `<common_dir>/gstack`
    pub fn repo_dir(&self) -> PathBuf {
        self.common_dir.join("gstack")
    }

    /// `<common_dir>/gstack/config.toml`
    pub fn repo_config_path(&self) -> PathBuf {
        self.repo_dir().join("config.toml")
    }
}
