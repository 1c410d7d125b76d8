//! core::state
//!
//! The persisted stack forest and the store contract around it.
//!
//! # Modules
//!
//! - [`schema`] - The v1 state document and the upsert/verify logic
//! - [`store`] - [`GitStateStore`], state kept as commits under a ref
//! - [`memory`] - [`MemoryStore`], the same contract held in memory
//!
//! # Transactions
//!
//! Writers hand [`StackStore::upsert_branches`] a whole batch plus a log
//! message. The batch is applied to a copy of the forest, verified, and
//! published in one step; readers see all of it or none of it.
//!
//! # Example
//!
//! ```
//! use gstack::core::state::{MemoryStore, StackStore, UpsertBranchRequest};
//! use gstack::core::types::{BranchName, Oid};
//!
//! let main = BranchName::new("main").unwrap();
//! let feature = BranchName::new("feature").unwrap();
//! let store = MemoryStore::new(main.clone());
//!
//! store.upsert_branches(
//!     &[UpsertBranchRequest {
//!         name: feature.clone(),
//!         base: main.clone(),
//!         base_hash: Some(Oid::new("a".repeat(40)).unwrap()),
//!     }],
//!     "create branch feature",
//! ).unwrap();
//!
//! assert_eq!(store.list_above(&main).unwrap(), vec![feature]);
//! ```

pub mod memory;
pub mod schema;
pub mod store;

pub use memory::MemoryStore;
pub use schema::{parse_state, StateError, StateV1};
pub use store::{GitStateStore, Transaction, STATE_FILE, STATE_REF};

use thiserror::Error;

use crate::core::types::{BranchName, Oid};
use crate::core::verify::VerifyError;
use crate::git::GitError;

/// Errors from stack state operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No state has been written for this repository yet.
    #[error("stack state not initialized; run 'gs init' first")]
    NotInitialized,

    /// `init` without `force` on an initialized repository.
    #[error("stack state already initialized with trunk '{trunk}'")]
    AlreadyInitialized { trunk: BranchName },

    /// The branch has no record.
    #[error("branch '{0}' is not tracked")]
    NotTracked(BranchName),

    /// A new record must say which commit its base was at.
    #[error("branch '{0}' is not tracked yet, so its base hash is required")]
    MissingBaseHash(BranchName),

    /// The batch would break the forest.
    #[error("invalid stack: {0}")]
    Invalid(#[from] VerifyError),

    /// Another writer published state since this transaction read it.
    #[error("stack state changed concurrently: expected {expected}, found {actual}")]
    Conflict { expected: String, actual: String },

    /// The stored document could not be decoded or encoded.
    #[error(transparent)]
    Schema(#[from] StateError),

    /// Git operation failed.
    #[error("git error: {0}")]
    Git(#[from] GitError),
}

/// Where a branch sits in the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchBase {
    /// Base branch (trunk or another tracked branch)
    pub name: BranchName,
    /// Commit of `name` when this base was last fixed
    pub hash: Oid,
}

/// A tracked branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: BranchName,
    pub base: BranchBase,
}

/// One record of an upsert batch.
///
/// `base_hash: None` reparents without touching the recorded hash, which
/// leaves the branch for a restack to realign. New records need a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertBranchRequest {
    pub name: BranchName,
    pub base: BranchName,
    pub base_hash: Option<Oid>,
}

/// Persisted stack state.
pub trait StackStore {
    /// The trunk every stack is rooted at.
    fn trunk(&self) -> Result<BranchName, StoreError>;

    /// The record for `name`, or [`StoreError::NotTracked`].
    fn lookup_branch(&self, name: &BranchName) -> Result<Branch, StoreError>;

    /// Tracked branches whose base is `name`, ascending by name.
    fn list_above(&self, name: &BranchName) -> Result<Vec<BranchName>, StoreError>;

    /// Every tracked branch, ascending by name.
    fn branches(&self) -> Result<Vec<Branch>, StoreError>;

    /// Apply `batch` as one transaction recorded under `message`.
    ///
    /// Nothing is published unless the whole batch applies and the result
    /// is still a trunk-rooted forest.
    fn upsert_branches(&self, batch: &[UpsertBranchRequest], message: &str) -> Result<(), StoreError>;
}
