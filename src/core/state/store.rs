//! core::state::store
//!
//! Stack state stored in the repository's object database.
//!
//! # Architecture
//!
//! The state ref [`STATE_REF`] points at a commit whose tree holds a single
//! file, [`STATE_FILE`]. Every transaction writes a new commit whose parent
//! is the commit it read, then moves the ref with compare-and-swap. So:
//!
//! - a transaction is published by exactly one ref update
//! - a concurrent writer makes the CAS fail instead of being overwritten
//! - the commit chain is an audit log of every change, see [`GitStateStore::history`]
//!
//! The store goes through [`Git`] for all of this and never touches `git2`.
//!
//! # Example
//!
//! ```ignore
//! use gstack::core::state::{GitStateStore, StackStore};
//! use gstack::git::Git;
//!
//! let git = Git::open(Path::new("."))?;
//! let store = GitStateStore::open(&git)?;
//!
//! for branch in store.branches()? {
//!     println!("{} is based on {}", branch.name, branch.base.name);
//! }
//! ```

use tracing::debug;

use super::schema::{parse_state, StateV1};
use super::{Branch, StackStore, StoreError, UpsertBranchRequest};
use crate::core::types::{BranchName, Oid, UtcTimestamp};
use crate::git::{Git, GitError};

/// Ref holding the state commit chain.
pub const STATE_REF: &str = "refs/gstack/data";

/// File inside each state commit.
pub const STATE_FILE: &str = "state.json";

/// One committed transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// The state commit
    pub id: Oid,
    /// Message the writer supplied
    pub message: String,
    /// When it was committed
    pub time: UtcTimestamp,
}

/// Stack state backed by a commit chain under [`STATE_REF`].
///
/// Reads are not cached: every call loads the commit the ref points at, so
/// state written by one handle is immediately visible to another.
#[derive(Debug)]
pub struct GitStateStore<'a> {
    git: &'a Git,
}

impl<'a> GitStateStore<'a> {
    /// Open the store of an initialized repository.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotInitialized`] if no state has been written
    pub fn open(git: &'a Git) -> Result<Self, StoreError> {
        if !git.ref_exists(STATE_REF) {
            return Err(StoreError::NotInitialized);
        }
        Ok(Self { git })
    }

    /// Create the store with `trunk` as the root of every stack.
    ///
    /// With `force`, an existing store is re-rooted at `trunk` instead;
    /// records that no longer chain to the new trunk are dropped.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyInitialized`] if state exists and `force` is false
    pub fn init(git: &'a Git, trunk: &BranchName, force: bool) -> Result<Self, StoreError> {
        let store = Self { git };
        let message = format!("initialize store with trunk {}", trunk);

        match store.load_optional()? {
            None => {
                store.publish(None, &StateV1::new(trunk.clone()), &message)?;
            }
            Some((_, existing)) if !force => {
                return Err(StoreError::AlreadyInitialized {
                    trunk: existing.trunk,
                });
            }
            Some((head, mut existing)) => {
                let dropped = existing.retrunk(trunk.clone());
                if !dropped.is_empty() {
                    debug!(?dropped, "records dropped by re-initialization");
                }
                store.publish(Some(&head), &existing, &message)?;
            }
        }

        Ok(store)
    }

    /// Current document and the commit it was read from.
    pub fn load(&self) -> Result<(Oid, StateV1), StoreError> {
        self.load_optional()?.ok_or(StoreError::NotInitialized)
    }

    fn load_optional(&self) -> Result<Option<(Oid, StateV1)>, StoreError> {
        let Some(head) = self.git.try_resolve_ref(STATE_REF)? else {
            return Ok(None);
        };
        let json = self.git.read_commit_file(&head, STATE_FILE)?;
        Ok(Some((head, parse_state(&json)?)))
    }

    /// Write `state` as a child of `parent` and move the ref to it.
    fn publish(&self, parent: Option<&Oid>, state: &StateV1, message: &str) -> Result<Oid, StoreError> {
        let json = state.to_canonical_json()?;
        let commit = self
            .git
            .write_file_commit(STATE_FILE, json.as_bytes(), parent, message)?;

        self.git
            .update_ref_cas(STATE_REF, &commit, parent, message)
            .map_err(|e| match e {
                GitError::CasFailed {
                    expected, actual, ..
                } => StoreError::Conflict { expected, actual },
                other => StoreError::Git(other),
            })?;

        debug!(commit = commit.short(7), txn = message, "published stack state");
        Ok(commit)
    }

    /// Committed transactions, newest first, at most `limit` of them.
    pub fn history(&self, limit: usize) -> Result<Vec<Transaction>, StoreError> {
        let (head, _) = self.load()?;
        Ok(self
            .git
            .log(&head, limit)?
            .into_iter()
            .map(|info| Transaction {
                id: info.oid,
                message: info.message.trim_end().to_string(),
                time: info.time,
            })
            .collect())
    }
}

impl StackStore for GitStateStore<'_> {
    fn trunk(&self) -> Result<BranchName, StoreError> {
        Ok(self.load()?.1.trunk)
    }

    fn lookup_branch(&self, name: &BranchName) -> Result<Branch, StoreError> {
        self.load()?
            .1
            .branch(name)
            .ok_or_else(|| StoreError::NotTracked(name.clone()))
    }

    fn list_above(&self, name: &BranchName) -> Result<Vec<BranchName>, StoreError> {
        Ok(self.load()?.1.children_of(name))
    }

    fn branches(&self) -> Result<Vec<Branch>, StoreError> {
        let (_, state) = self.load()?;
        Ok(state
            .branches
            .keys()
            .filter_map(|name| state.branch(name))
            .collect())
    }

    fn upsert_branches(&self, batch: &[UpsertBranchRequest], message: &str) -> Result<(), StoreError> {
        let (head, mut state) = self.load()?;
        state.apply(batch)?;
        self.publish(Some(&head), &state, message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ref_is_outside_branch_namespace() {
        assert!(!STATE_REF.starts_with("refs/heads/"));
        assert!(STATE_REF.starts_with("refs/"));
    }

    #[test]
    fn conflict_error_display() {
        let err = StoreError::Conflict {
            expected: "abc".into(),
            actual: "def".into(),
        };
        assert!(err.to_string().contains("concurrently"));
    }
}
