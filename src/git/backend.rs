//! git::backend
//!
//! The version-control surface the branch engine drives.
//!
//! The engine never sees `git2`; it sees this trait. [`super::Git`] is the
//! production implementation, and the scripted backend in `git::mock`
//! stands in for it when tests need a step to fail on demand.

use super::GitError;
use crate::core::types::{BranchName, Oid};

/// Parameters for a commit on the current HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    /// Commit even if the index matches HEAD.
    pub allow_empty: bool,
    /// Full commit message.
    pub message: String,
}

/// Working-checkout primitives used to create a branch.
pub trait VersionControl {
    /// Branch HEAD points at, or `None` when detached or unborn.
    fn current_branch(&self) -> Result<Option<BranchName>, GitError>;

    /// Resolve a revision (e.g. `"HEAD"`) to a commit.
    fn peel_to_commit(&self, rev: &str) -> Result<Oid, GitError>;

    /// Paths whose index entries differ from `tree_ish`'s tree.
    fn diff_index(&self, tree_ish: &Oid) -> Result<Vec<String>, GitError>;

    /// Point HEAD directly at `target`, carrying local changes along.
    fn detach_head(&self, target: &Oid) -> Result<(), GitError>;

    /// Commit the index on top of HEAD and advance HEAD.
    ///
    /// Fails with [`GitError::NothingToCommit`] when the index matches HEAD
    /// and `allow_empty` is false.
    fn commit(&self, request: &CommitRequest) -> Result<Oid, GitError>;

    /// Create `name` at `head`. Fails with [`GitError::BranchExists`] rather
    /// than moving an existing branch.
    fn create_branch(&self, name: &BranchName, head: &Oid) -> Result<(), GitError>;

    /// Switch the working tree and HEAD to `name`.
    fn checkout(&self, name: &BranchName) -> Result<(), GitError>;
}
