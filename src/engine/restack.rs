//! engine::restack
//!
//! Moving branches back on top of their bases.
//!
//! # Architecture
//!
//! [`RestackEngine`] is the seam the branch creator calls after an insertion
//! has reparented branches. [`UpstackRestacker`] implements it with `git
//! rebase --onto`: each branch's recorded base hash marks where its own
//! commits begin, so
//!
//! ```text
//! git rebase --onto <tip of base> <recorded base hash> <branch>
//! ```
//!
//! replays exactly the branch's commits onto the base's current tip.
//!
//! # Invariants
//!
//! - Parents are restacked before their children
//! - A branch whose recorded base hash equals its base's tip is left alone
//! - Each restacked branch gets its own store transaction, so a stop halfway
//!   leaves every finished branch recorded
//!
//! # Example
//!
//! ```ignore
//! use gstack::engine::restack::UpstackRestacker;
//!
//! let restacker = UpstackRestacker::new(&git, &store);
//! for branch in restacker.run(&Cancellation::new())? {
//!     println!("restacked {branch}");
//! }
//! ```

use thiserror::Error;
use tracing::{debug, info};

use crate::core::cancel::Cancellation;
use crate::core::graph::StackGraph;
use crate::core::state::{StackStore, StoreError, UpsertBranchRequest};
use crate::core::types::BranchName;
use crate::git::{Git, GitError, VersionControl};

/// Errors from restacking.
#[derive(Debug, Error)]
pub enum RestackError {
    /// Restacking starts from a branch, not a detached HEAD.
    #[error("HEAD is detached; check out a branch to restack")]
    NotOnBranch,

    /// The rebase stopped on conflicts and is waiting for the user.
    #[error("restack of '{branch}' stopped on conflicts; resolve them and run 'git rebase --continue'")]
    Conflict { branch: BranchName },

    /// The rebase failed for another reason.
    #[error("restack of '{branch}' failed")]
    Rebase {
        branch: BranchName,
        #[source]
        source: GitError,
    },

    /// Interrupted between branches.
    #[error("restack interrupted before '{next}'")]
    Cancelled { next: BranchName },

    /// Reading or writing stack state failed.
    #[error(transparent)]
    State(#[from] StoreError),

    /// A git call outside the rebase itself failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Restacks the checked-out branch and everything above it.
pub trait RestackEngine {
    /// Restack the current branch (unless it is trunk) and its descendants.
    fn restack_upstack_of_current(&self, cancel: &Cancellation) -> Result<(), RestackError>;
}

/// [`RestackEngine`] backed by `git rebase --onto`.
pub struct UpstackRestacker<'a> {
    git: &'a Git,
    store: &'a dyn StackStore,
}

impl<'a> UpstackRestacker<'a> {
    pub fn new(git: &'a Git, store: &'a dyn StackStore) -> Self {
        Self { git, store }
    }

    /// Restack upstack of the current branch, returning the branches that
    /// were actually rebased, parents first.
    pub fn run(&self, cancel: &Cancellation) -> Result<Vec<BranchName>, RestackError> {
        let current = self.git.current_branch()?.ok_or(RestackError::NotOnBranch)?;
        let trunk = self.store.trunk()?;
        let branches = self.store.branches()?;
        let graph = StackGraph::from_edges(branches.iter().map(|b| (&b.name, &b.base.name)));

        let order = if current == trunk {
            graph.descendants(&trunk)
        } else if graph.contains(&current) {
            graph.upstack_order(&current)
        } else {
            return Err(StoreError::NotTracked(current).into());
        };
        debug!(?order, "restack order");

        let mut restacked = Vec::new();
        for branch in order {
            if cancel.is_cancelled() {
                return Err(RestackError::Cancelled { next: branch });
            }
            if self.restack_one(&branch)? {
                restacked.push(branch);
            }
        }

        if !restacked.is_empty() {
            self.git.checkout(&current)?;
        }
        Ok(restacked)
    }

    /// Rebase `branch` onto its base's tip. Returns false if it was already there.
    fn restack_one(&self, branch: &BranchName) -> Result<bool, RestackError> {
        // Re-read each time: restacking a parent moves the tip its children
        // are compared against.
        let record = self.store.lookup_branch(branch)?;
        let parent_tip = self.git.branch_tip(&record.base.name)?;

        if record.base.hash == parent_tip {
            debug!(branch = %branch, "already on its base");
            return Ok(false);
        }

        info!(branch = %branch, onto = %record.base.name, "restacking");
        self.git
            .rebase_onto(&parent_tip, &record.base.hash, branch)
            .map_err(|source| match source {
                GitError::OperationInProgress { .. } => RestackError::Conflict {
                    branch: branch.clone(),
                },
                source => RestackError::Rebase {
                    branch: branch.clone(),
                    source,
                },
            })?;

        self.store.upsert_branches(
            &[UpsertBranchRequest {
                name: branch.clone(),
                base: record.base.name.clone(),
                base_hash: Some(parent_tip),
            }],
            &format!("restack {} onto {}", branch, record.base.name),
        )?;
        Ok(true)
    }
}

impl RestackEngine for UpstackRestacker<'_> {
    fn restack_upstack_of_current(&self, cancel: &Cancellation) -> Result<(), RestackError> {
        self.run(cancel).map(|_| ())
    }
}
