//! engine::rollback
//!
//! Returning the working checkout to the branch a command started on.
//!
//! A command that moves HEAD takes a [`RestorePoint`] first and runs the
//! rest of its work inside [`RestorePoint::guard`]. If that work fails, the
//! guard checks the starting branch back out before handing the failure up.
//!
//! # Known Limitations
//!
//! - Only HEAD is restored. Branches created and state already published
//!   stay where they are.
//! - A checkout that fails during restore leaves HEAD wherever the failed
//!   operation put it. The caller gets both errors.

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::types::BranchName;
use crate::git::{GitError, VersionControl};

/// Errors from restoring the starting branch.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// Checking the branch back out failed.
    #[error("could not check out '{branch}' again: {source}")]
    Checkout {
        /// The branch being restored
        branch: BranchName,
        /// Why the checkout failed
        #[source]
        source: GitError,
    },
}

/// A failed guarded operation, plus how the restore went.
#[derive(Debug)]
pub struct RolledBack<E> {
    /// Why the guarded operation failed.
    pub cause: E,
    /// Outcome of checking the starting branch back out.
    pub restore: Result<(), RollbackError>,
}

/// The branch to return to if a guarded operation fails.
pub struct RestorePoint<'a> {
    vcs: &'a dyn VersionControl,
    branch: BranchName,
}

impl<'a> RestorePoint<'a> {
    /// Remember `branch` as the place to return to.
    pub fn new(vcs: &'a dyn VersionControl, branch: BranchName) -> Self {
        Self { vcs, branch }
    }

    /// Run `body`. On failure, check the remembered branch back out.
    ///
    /// The restore is attempted once, whatever `body` failed on. Success
    /// passes through untouched.
    pub fn guard<T, E>(&self, body: impl FnOnce() -> Result<T, E>) -> Result<T, RolledBack<E>>
    where
        E: std::fmt::Display,
    {
        body().map_err(|cause| {
            warn!(branch = %self.branch, error = %cause, "operation failed, restoring branch");
            let restore = self.restore();
            RolledBack { cause, restore }
        })
    }

    fn restore(&self) -> Result<(), RollbackError> {
        match self.vcs.checkout(&self.branch) {
            Ok(()) => {
                debug!(branch = %self.branch, "restored branch");
                Ok(())
            }
            Err(source) => {
                warn!(branch = %self.branch, error = %source, "restore failed");
                Err(RollbackError::Checkout {
                    branch: self.branch.clone(),
                    source,
                })
            }
        }
    }
}
