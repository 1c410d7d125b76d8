//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. No other module imports
//! `git2` or spawns `git`.
//!
//! - [`VersionControl`] is the narrow trait the branch engine drives
//! - [`Git`] implements it on top of `git2`, and also carries the object
//!   and CAS ref helpers the state store needs
//! - `mock::MockVcs` is a scripted implementation for failure injection,
//!   compiled for unit tests or with the `fault_injection` feature
//!
//! # Invariants
//!
//! - Ref updates made on behalf of the state store use CAS semantics
//! - Branch creation never moves an existing branch
//! - All operations return strong types (Oid, BranchName)
//!
//! # Example
//!
//! ```ignore
//! use gstack::git::{Git, VersionControl};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let current = git.current_branch()?;
//! let head = git.peel_to_commit("HEAD")?;
//! ```

mod backend;
mod interface;

#[cfg(any(test, feature = "fault_injection"))]
pub mod mock;

pub use backend::{CommitRequest, VersionControl};
pub use interface::{CommitInfo, Git, GitError, GitState, RepoInfo};
