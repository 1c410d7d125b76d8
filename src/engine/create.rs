//! engine::create
//!
//! Creating a branch at the end of a stack or in the middle of one.
//!
//! # Architecture
//!
//! [`BranchCreator::create`] runs in two halves. The first half reads:
//! it resolves the current branch, checks the index, and asks
//! [`plan_insertion`] where the new branch goes. Nothing is changed yet, so
//! every precondition failure leaves the repository exactly as it was.
//!
//! The second half writes. HEAD is detached at the anchor commit, the new
//! commit is made there, the branch is created and checked out, and the
//! stack records are published in a single store transaction. All of it
//! runs inside a [`RestorePoint`] guard, so any failure puts HEAD back on
//! the branch the user started from.
//!
//! ```text
//! Idle -> Resolving -> Detached -> Committed -> BranchCreated
//!      -> CheckedOut -> StatePersisted -> [Restacking] -> Done
//! ```
//!
//! # Modes
//!
//! With `C` the current branch at `H`:
//!
//! - [`InsertMode::Append`]: the new branch goes on top of `C`.
//! - [`InsertMode::InsertAbove`]: same, and `C`'s children move onto it.
//! - [`InsertMode::InsertBelow`]: the new branch goes between `C` and its
//!   base, and `C` moves onto it.
//!
//! The two insert modes leave moved branches with stale base hashes, which
//! the [`RestackEngine`] then realigns.
//!
//! # Known Limitations
//!
//! - A restack failure does not undo the published transaction. The records
//!   already describe the new shape and `gs restack` picks up from there.
//! - The commit made before a failure stays in the object database,
//!   unreferenced, until git collects it.
//!
//! # Example
//!
//! ```ignore
//! use gstack::engine::create::{BranchCreator, CreateRequest, InsertMode};
//!
//! let creator = BranchCreator::new(&git, &store, &restacker);
//! let outcome = creator.create(&CreateRequest {
//!     name: Some("feature-b".into()),
//!     mode: InsertMode::InsertAbove,
//!     message: None,
//! })?;
//! println!("created {} on {}", outcome.branch, outcome.base.name);
//! ```

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use super::restack::{RestackEngine, RestackError};
use super::rollback::{RestorePoint, RollbackError, RolledBack};
use crate::core::cancel::Cancellation;
use crate::core::state::{BranchBase, StackStore, StoreError, UpsertBranchRequest};
use crate::core::types::{BranchName, Oid};
use crate::git::{CommitRequest, GitError, VersionControl};

/// Where the new branch goes relative to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// On top of the current branch.
    #[default]
    Append,
    /// On top of the current branch, taking over its children.
    InsertAbove,
    /// Between the current branch and its base.
    InsertBelow,
}

impl InsertMode {
    /// Mode for the `--insert` / `--below` flag pair. `below` implies insert.
    pub fn from_flags(insert: bool, below: bool) -> Self {
        match (insert, below) {
            (_, true) => InsertMode::InsertBelow,
            (true, false) => InsertMode::InsertAbove,
            (false, false) => InsertMode::Append,
        }
    }
}

/// A branch creation request.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// Name of the new branch.
    pub name: Option<String>,
    pub mode: InsertMode,
    /// Commit message. Defaults to the branch name.
    pub message: Option<String>,
}

/// What a successful creation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    /// The new branch, now checked out.
    pub branch: BranchName,
    /// The commit the branch points at.
    pub commit: Oid,
    /// The base recorded for the new branch.
    pub base: BranchBase,
    /// Whether the commit carried no staged changes.
    pub empty_commit: bool,
    /// Branches that moved onto the new branch.
    pub moved: Vec<BranchName>,
}

/// The step a failure happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    DiffIndex,
    DetachHead,
    Commit,
    CreateBranch,
    CheckoutBranch,
    PersistState,
    Restack,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Resolve => "resolve",
            Stage::DiffIndex => "diff index",
            Stage::DetachHead => "detach head",
            Stage::Commit => "commit",
            Stage::CreateBranch => "create branch",
            Stage::CheckoutBranch => "checkout branch",
            Stage::PersistState => "persist state",
            Stage::Restack => "restack",
        })
    }
}

/// Progress through a creation, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Detached,
    Committed,
    BranchCreated,
    CheckedOut,
    StatePersisted,
    Restacking,
    Done,
}

impl Phase {
    fn enter(self) {
        debug!(phase = ?self, "create");
    }
}

/// Errors from branch creation.
#[derive(Debug, Error)]
pub enum CreateError {
    /// No branch name was given.
    #[error("a branch name is required")]
    MissingName,

    /// The name is not a valid branch name.
    #[error("invalid branch name: {0}")]
    InvalidName(String),

    /// The request makes no sense from here.
    #[error("{0}")]
    InvalidOperation(String),

    /// The current branch has no stack record.
    #[error("branch '{0}' is not tracked; track it before inserting around it")]
    NotTracked(BranchName),

    /// A version control step failed.
    #[error("{stage}")]
    Backend {
        stage: Stage,
        #[source]
        source: GitError,
    },

    /// Stack state could not be read or written.
    #[error("update stack state")]
    State(#[source] StoreError),

    /// The follow-up restack failed.
    #[error(transparent)]
    Restack(RestackError),

    /// Interrupted before `stage`.
    #[error("interrupted before {stage}")]
    Cancelled { stage: Stage },

    /// The operation failed and HEAD could not be moved back either.
    #[error("restoring '{branch}' failed ({restore}) after error")]
    RestoreFailed {
        #[source]
        cause: Box<CreateError>,
        branch: BranchName,
        restore: GitError,
    },
}

impl CreateError {
    fn at(stage: Stage) -> impl FnOnce(GitError) -> CreateError {
        move |source| CreateError::Backend { stage, source }
    }
}

/// Where a new branch goes and what it moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPlan {
    /// Base for the new branch. HEAD is detached at `anchor.hash`.
    pub anchor: BranchBase,
    /// Tracked branches that move onto the new branch.
    pub moved: Vec<BranchName>,
    /// The store transaction.
    pub upserts: Vec<UpsertBranchRequest>,
    /// Message for the store transaction.
    pub message: String,
}

/// Work out where `name` goes when created from `current` at `head`.
///
/// Only reads the store. Every mode needs `current` in the forest, so
/// appending or inserting above an untracked branch is refused the same
/// way inserting below one is; the new record's base must be tracked.
///
/// # Errors
///
/// - [`CreateError::InvalidOperation`] for insert-below from trunk
/// - [`CreateError::NotTracked`] when `current` is neither trunk nor tracked,
///   whatever the mode
pub fn plan_insertion(
    store: &dyn StackStore,
    mode: InsertMode,
    name: &BranchName,
    current: &BranchName,
    head: &Oid,
) -> Result<InsertionPlan, CreateError> {
    let trunk = store.trunk().map_err(CreateError::State)?;
    let on_trunk = *current == trunk;

    if on_trunk && mode == InsertMode::InsertBelow {
        return Err(insert_below_trunk(&trunk));
    }

    let current_record = if on_trunk {
        None
    } else {
        match store.lookup_branch(current) {
            Ok(record) => Some(record),
            Err(StoreError::NotTracked(branch)) => return Err(CreateError::NotTracked(branch)),
            Err(e) => return Err(CreateError::State(e)),
        }
    };

    let here = BranchBase {
        name: current.clone(),
        hash: head.clone(),
    };
    let (anchor, moved, message) = match mode {
        InsertMode::Append => (here, Vec::new(), format!("create branch {}", name)),
        InsertMode::InsertAbove => {
            let moved = store.list_above(current).map_err(CreateError::State)?;
            let message = format!("insert branch {} above {}", name, current);
            (here, moved, message)
        }
        InsertMode::InsertBelow => {
            let record = current_record.ok_or_else(|| insert_below_trunk(&trunk))?;
            let message = format!("insert branch {} below {}", name, record.base.name);
            (record.base, vec![current.clone()], message)
        }
    };

    let mut upserts = vec![UpsertBranchRequest {
        name: name.clone(),
        base: anchor.name.clone(),
        base_hash: Some(anchor.hash.clone()),
    }];
    upserts.extend(moved.iter().map(|branch| UpsertBranchRequest {
        name: branch.clone(),
        base: name.clone(),
        base_hash: None,
    }));

    Ok(InsertionPlan {
        anchor,
        moved,
        upserts,
        message,
    })
}

fn insert_below_trunk(trunk: &BranchName) -> CreateError {
    CreateError::InvalidOperation(format!("cannot insert below trunk '{}'", trunk))
}

fn parse_name(name: Option<&str>) -> Result<BranchName, CreateError> {
    match name.map(str::trim) {
        None | Some("") => Err(CreateError::MissingName),
        Some(raw) => BranchName::new(raw).map_err(|e| CreateError::InvalidName(e.to_string())),
    }
}

/// Creates branches in a stack.
pub struct BranchCreator<'a> {
    vcs: &'a dyn VersionControl,
    store: &'a dyn StackStore,
    restacker: &'a dyn RestackEngine,
    cancel: Cancellation,
}

impl<'a> BranchCreator<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        store: &'a dyn StackStore,
        restacker: &'a dyn RestackEngine,
    ) -> Self {
        Self {
            vcs,
            store,
            restacker,
            cancel: Cancellation::new(),
        }
    }

    /// Observe `cancel` between steps.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create the branch described by `request` and check it out.
    ///
    /// # Errors
    ///
    /// Precondition failures ([`CreateError::MissingName`],
    /// [`CreateError::InvalidName`], [`CreateError::InvalidOperation`],
    /// [`CreateError::NotTracked`]) change nothing. Any failure after HEAD
    /// has been detached checks the starting branch back out first; if that
    /// also fails the result is [`CreateError::RestoreFailed`].
    pub fn create(&self, request: &CreateRequest) -> Result<CreateOutcome, CreateError> {
        Phase::Idle.enter();
        let name = parse_name(request.name.as_deref())?;

        Phase::Resolving.enter();
        self.checkpoint(Stage::Resolve)?;
        let current = self
            .vcs
            .current_branch()
            .map_err(CreateError::at(Stage::Resolve))?
            .ok_or(CreateError::Backend {
                stage: Stage::Resolve,
                source: GitError::DetachedHead,
            })?;
        let head = self
            .vcs
            .peel_to_commit("HEAD")
            .map_err(CreateError::at(Stage::Resolve))?;

        self.checkpoint(Stage::DiffIndex)?;
        let staged = self
            .vcs
            .diff_index(&head)
            .map_err(CreateError::at(Stage::DiffIndex))?;

        let plan = plan_insertion(self.store, request.mode, &name, &current, &head)?;
        debug!(anchor = %plan.anchor.name, moved = ?plan.moved, "insertion planned");

        self.checkpoint(Stage::DetachHead)?;
        self.vcs
            .detach_head(&plan.anchor.hash)
            .map_err(CreateError::at(Stage::DetachHead))?;
        Phase::Detached.enter();

        let restore = RestorePoint::new(self.vcs, current);
        restore
            .guard(|| self.write(&name, request, &plan, staged.is_empty()))
            .map_err(|rolled| {
                Phase::Idle.enter();
                merge_restore(rolled)
            })
    }

    /// Everything after the detach. Runs under the restore point.
    fn write(
        &self,
        name: &BranchName,
        request: &CreateRequest,
        plan: &InsertionPlan,
        allow_empty: bool,
    ) -> Result<CreateOutcome, CreateError> {
        self.checkpoint(Stage::Commit)?;
        let message = request
            .message
            .clone()
            .unwrap_or_else(|| name.to_string());
        let commit = self
            .vcs
            .commit(&CommitRequest {
                allow_empty,
                message,
            })
            .map_err(CreateError::at(Stage::Commit))?;
        Phase::Committed.enter();

        self.checkpoint(Stage::CreateBranch)?;
        self.vcs
            .create_branch(name, &commit)
            .map_err(CreateError::at(Stage::CreateBranch))?;
        Phase::BranchCreated.enter();

        self.checkpoint(Stage::CheckoutBranch)?;
        self.vcs
            .checkout(name)
            .map_err(CreateError::at(Stage::CheckoutBranch))?;
        Phase::CheckedOut.enter();

        self.checkpoint(Stage::PersistState)?;
        self.store
            .upsert_branches(&plan.upserts, &plan.message)
            .map_err(CreateError::State)?;
        Phase::StatePersisted.enter();
        info!(branch = %name, base = %plan.anchor.name, "{}", plan.message);

        if !plan.moved.is_empty() {
            self.checkpoint(Stage::Restack)?;
            Phase::Restacking.enter();
            self.restacker
                .restack_upstack_of_current(&self.cancel)
                .map_err(CreateError::Restack)?;
        }

        Phase::Done.enter();
        Ok(CreateOutcome {
            branch: name.clone(),
            commit,
            base: plan.anchor.clone(),
            empty_commit: allow_empty,
            moved: plan.moved.clone(),
        })
    }

    fn checkpoint(&self, stage: Stage) -> Result<(), CreateError> {
        if self.cancel.is_cancelled() {
            return Err(CreateError::Cancelled { stage });
        }
        Ok(())
    }
}

fn merge_restore(rolled: RolledBack<CreateError>) -> CreateError {
    match rolled.restore {
        Ok(()) => rolled.cause,
        Err(RollbackError::Checkout { branch, source }) => CreateError::RestoreFailed {
            cause: Box::new(rolled.cause),
            branch,
            restore: source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::MemoryStore;
    use crate::git::mock::{MockHead, MockOp, MockVcs};
    use std::cell::RefCell;

    fn name(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    /// Restack stand-in that records calls and can be told to fail.
    #[derive(Default)]
    struct ScriptedRestack {
        calls: RefCell<usize>,
        fail: bool,
    }

    impl ScriptedRestack {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            *self.calls.borrow()
        }
    }

    impl RestackEngine for ScriptedRestack {
        fn restack_upstack_of_current(&self, _cancel: &Cancellation) -> Result<(), RestackError> {
            *self.calls.borrow_mut() += 1;
            if self.fail {
                return Err(RestackError::Conflict { branch: name("d") });
            }
            Ok(())
        }
    }

    fn request(branch: &str, mode: InsertMode) -> CreateRequest {
        CreateRequest {
            name: Some(branch.to_string()),
            mode,
            message: None,
        }
    }

    /// main -> b -> {d, e}, checked out on `at`.
    struct Fixture {
        vcs: MockVcs,
        store: MemoryStore,
        restack: ScriptedRestack,
    }

    impl Fixture {
        fn new(at: &str) -> Self {
            let vcs = MockVcs::new()
                .with_branch(&name("main"))
                .with_branch(&name("b"))
                .with_branch(&name("d"))
                .with_branch(&name("e"))
                .with_branch(&name("loose"))
                .on_branch(&name(at));
            let store = MemoryStore::new(name("main"));
            let tip = |b: &str| vcs.tip(&name(b));
            store
                .upsert_branches(
                    &[
                        UpsertBranchRequest {
                            name: name("b"),
                            base: name("main"),
                            base_hash: tip("main"),
                        },
                        UpsertBranchRequest {
                            name: name("d"),
                            base: name("b"),
                            base_hash: tip("b"),
                        },
                        UpsertBranchRequest {
                            name: name("e"),
                            base: name("b"),
                            base_hash: tip("b"),
                        },
                    ],
                    "setup",
                )
                .unwrap();
            Self {
                vcs,
                store,
                restack: ScriptedRestack::default(),
            }
        }

        fn creator(&self) -> BranchCreator<'_> {
            BranchCreator::new(&self.vcs, &self.store, &self.restack)
        }

        fn base_of(&self, branch: &str) -> BranchName {
            self.store.lookup_branch(&name(branch)).unwrap().base.name
        }
    }

    mod modes {
        use super::*;

        #[test]
        fn append_with_nothing_staged_makes_empty_commit() {
            let fx = Fixture::new("b");
            let b_tip = fx.vcs.tip(&name("b")).unwrap();

            let outcome = fx.creator().create(&request("x", InsertMode::Append)).unwrap();

            assert!(outcome.empty_commit);
            assert!(outcome.moved.is_empty());
            assert_eq!(outcome.base.hash, b_tip);
            assert_eq!(fx.base_of("x"), name("b"));
            assert_eq!(fx.vcs.head(), MockHead::Branch(name("x")));
            assert_eq!(fx.vcs.commits()[0].parent, b_tip);
            assert_eq!(fx.restack.calls(), 0);
            assert_eq!(fx.store.log().last().unwrap(), "create branch x");
        }

        #[test]
        fn staged_changes_are_committed_with_message() {
            let fx = Fixture::new("b");
            let vcs = fx.vcs.clone().with_staged(&["src/lib.rs"]);
            let creator = BranchCreator::new(&vcs, &fx.store, &fx.restack);

            let outcome = creator
                .create(&CreateRequest {
                    message: Some("add parser".into()),
                    ..request("x", InsertMode::Append)
                })
                .unwrap();

            assert!(!outcome.empty_commit);
            let commit = &vcs.commits()[0];
            assert_eq!(commit.message, "add parser");
            assert!(!commit.empty);
        }

        #[test]
        fn commit_message_defaults_to_branch_name() {
            let fx = Fixture::new("main");
            fx.creator().create(&request("x", InsertMode::Append)).unwrap();
            assert_eq!(fx.vcs.commits()[0].message, "x");
        }

        #[test]
        fn insert_above_takes_over_children() {
            let fx = Fixture::new("b");

            let outcome = fx.creator().create(&request("n", InsertMode::InsertAbove)).unwrap();

            assert_eq!(outcome.moved, vec![name("d"), name("e")]);
            assert_eq!(fx.store.list_above(&name("b")).unwrap(), vec![name("n")]);
            assert_eq!(
                fx.store.list_above(&name("n")).unwrap(),
                vec![name("d"), name("e")]
            );
            assert_eq!(fx.restack.calls(), 1);
            assert_eq!(fx.store.log().last().unwrap(), "insert branch n above b");
        }

        #[test]
        fn insert_above_childless_branch_skips_restack() {
            let fx = Fixture::new("d");
            let outcome = fx.creator().create(&request("n", InsertMode::InsertAbove)).unwrap();
            assert!(outcome.moved.is_empty());
            assert_eq!(fx.restack.calls(), 0);
        }

        #[test]
        fn moved_children_keep_their_old_base_hash() {
            let fx = Fixture::new("b");
            let b_tip = fx.vcs.tip(&name("b")).unwrap();

            fx.creator().create(&request("n", InsertMode::InsertAbove)).unwrap();

            let d = fx.store.lookup_branch(&name("d")).unwrap();
            assert_eq!(d.base.name, name("n"));
            assert_eq!(d.base.hash, b_tip);
        }

        #[test]
        fn insert_below_goes_between_branch_and_base() {
            let fx = Fixture::new("b");
            let main_tip = fx.vcs.tip(&name("main")).unwrap();

            let outcome = fx.creator().create(&request("c", InsertMode::InsertBelow)).unwrap();

            assert_eq!(outcome.base.name, name("main"));
            assert_eq!(fx.vcs.commits()[0].parent, main_tip);
            assert_eq!(fx.base_of("c"), name("main"));
            assert_eq!(fx.base_of("b"), name("c"));
            assert_eq!(fx.vcs.head(), MockHead::Branch(name("c")));
            assert_eq!(fx.restack.calls(), 1);
            assert_eq!(fx.store.log().last().unwrap(), "insert branch c below main");
        }
    }

    mod preconditions {
        use super::*;

        fn assert_untouched(fx: &Fixture, at: &str) {
            assert_eq!(fx.vcs.head(), MockHead::Branch(name(at)));
            assert!(fx.vcs.commits().is_empty());
            assert_eq!(fx.store.log(), vec!["setup"]);
        }

        #[test]
        fn missing_name() {
            let fx = Fixture::new("b");
            for raw in [None, Some(""), Some("   ")] {
                let req = CreateRequest {
                    name: raw.map(String::from),
                    ..Default::default()
                };
                assert!(matches!(fx.creator().create(&req), Err(CreateError::MissingName)));
            }
            assert!(fx.vcs.calls().is_empty());
        }

        #[test]
        fn invalid_name() {
            let fx = Fixture::new("b");
            for bad in ["bad..name", "feat.", "/feat"] {
                let err = fx.creator().create(&request(bad, InsertMode::Append));
                assert!(matches!(err, Err(CreateError::InvalidName(_))), "{bad:?}");
            }
            assert_untouched(&fx, "b");
        }

        #[test]
        fn insert_below_trunk_is_invalid() {
            let fx = Fixture::new("main");
            let err = fx.creator().create(&request("c", InsertMode::InsertBelow));
            assert!(matches!(err, Err(CreateError::InvalidOperation(_))));
            assert_untouched(&fx, "main");
        }

        #[test]
        fn insert_below_untracked_is_not_tracked() {
            let fx = Fixture::new("loose");
            let err = fx.creator().create(&request("c", InsertMode::InsertBelow));
            assert!(matches!(err, Err(CreateError::NotTracked(b)) if b == name("loose")));
            assert_untouched(&fx, "loose");
        }

        #[test]
        fn append_on_untracked_is_not_tracked() {
            let fx = Fixture::new("loose");
            let err = fx.creator().create(&request("c", InsertMode::Append));
            assert!(matches!(err, Err(CreateError::NotTracked(_))));
            assert_untouched(&fx, "loose");
        }

        #[test]
        fn detached_head_fails_to_resolve() {
            let fx = Fixture::new("b");
            let tip = fx.vcs.tip(&name("b")).unwrap();
            let vcs = fx.vcs.clone().detached_at(&tip);
            let creator = BranchCreator::new(&vcs, &fx.store, &fx.restack);

            let err = creator.create(&request("x", InsertMode::Append)).unwrap_err();
            assert!(matches!(
                err,
                CreateError::Backend {
                    stage: Stage::Resolve,
                    source: GitError::DetachedHead
                }
            ));
        }

        #[test]
        fn diff_failure_happens_before_detach() {
            let fx = Fixture::new("b");
            let vcs = fx.vcs.clone().fail_once(MockOp::DiffIndex);
            let creator = BranchCreator::new(&vcs, &fx.store, &fx.restack);

            let err = creator.create(&request("x", InsertMode::Append)).unwrap_err();
            assert!(matches!(err, CreateError::Backend { stage: Stage::DiffIndex, .. }));
            assert_untouched(&fx, "b");
        }
    }

    mod rollback {
        use super::*;

        fn fail_at(op: MockOp) -> (Fixture, CreateError) {
            let fx = Fixture::new("b");
            let vcs = fx.vcs.clone().fail_once(op);
            let err = BranchCreator::new(&vcs, &fx.store, &fx.restack)
                .create(&request("n", InsertMode::InsertAbove))
                .unwrap_err();
            (fx, err)
        }

        fn assert_restored(fx: &Fixture) {
            assert_eq!(fx.vcs.head(), MockHead::Branch(name("b")));
            assert_eq!(fx.store.log(), vec!["setup"]);
            assert!(fx.vcs.calls().last().unwrap().starts_with("checkout(b)"));
        }

        #[test]
        fn detach_failure_has_nothing_to_restore() {
            let (fx, err) = fail_at(MockOp::DetachHead);
            assert!(matches!(err, CreateError::Backend { stage: Stage::DetachHead, .. }));
            assert!(!fx.vcs.calls().iter().any(|c| c.starts_with("checkout")));
        }

        #[test]
        fn commit_failure_restores_branch() {
            let (fx, err) = fail_at(MockOp::Commit);
            assert!(matches!(err, CreateError::Backend { stage: Stage::Commit, .. }));
            assert_restored(&fx);
        }

        #[test]
        fn create_branch_failure_restores_branch() {
            let (fx, err) = fail_at(MockOp::CreateBranch);
            assert!(matches!(err, CreateError::Backend { stage: Stage::CreateBranch, .. }));
            assert_restored(&fx);
            assert!(fx.vcs.tip(&name("n")).is_none());
        }

        #[test]
        fn checkout_failure_restores_branch() {
            let (fx, err) = fail_at(MockOp::Checkout);
            assert!(matches!(err, CreateError::Backend { stage: Stage::CheckoutBranch, .. }));
            assert_restored(&fx);
        }

        #[test]
        fn existing_branch_name_is_rejected_and_restored() {
            let fx = Fixture::new("b");
            let err = fx.creator().create(&request("d", InsertMode::Append)).unwrap_err();
            assert!(matches!(
                err,
                CreateError::Backend {
                    stage: Stage::CreateBranch,
                    source: GitError::BranchExists { .. }
                }
            ));
            assert_restored(&fx);
        }

        /// Delegates reads, rejects every write.
        struct ReadOnlyStore(MemoryStore);

        impl StackStore for ReadOnlyStore {
            fn trunk(&self) -> Result<BranchName, StoreError> {
                self.0.trunk()
            }
            fn lookup_branch(&self, name: &BranchName) -> Result<crate::core::state::Branch, StoreError> {
                self.0.lookup_branch(name)
            }
            fn list_above(&self, name: &BranchName) -> Result<Vec<BranchName>, StoreError> {
                self.0.list_above(name)
            }
            fn branches(&self) -> Result<Vec<crate::core::state::Branch>, StoreError> {
                self.0.branches()
            }
            fn upsert_branches(&self, _: &[UpsertBranchRequest], _: &str) -> Result<(), StoreError> {
                Err(StoreError::Conflict {
                    expected: "a".into(),
                    actual: "b".into(),
                })
            }
        }

        #[test]
        fn state_failure_restores_branch() {
            let fx = Fixture::new("b");
            let store = ReadOnlyStore(fx.store.clone());
            let err = BranchCreator::new(&fx.vcs, &store, &fx.restack)
                .create(&request("n", InsertMode::InsertAbove))
                .unwrap_err();

            assert!(matches!(err, CreateError::State(StoreError::Conflict { .. })));
            assert_restored(&fx);
            assert_eq!(fx.restack.calls(), 0);
        }

        #[test]
        fn restack_failure_keeps_state_and_restores_branch() {
            let fx = Fixture::new("b");
            let restack = ScriptedRestack::failing();
            let err = BranchCreator::new(&fx.vcs, &fx.store, &restack)
                .create(&request("n", InsertMode::InsertAbove))
                .unwrap_err();

            assert!(matches!(err, CreateError::Restack(RestackError::Conflict { .. })));
            assert_eq!(fx.vcs.head(), MockHead::Branch(name("b")));
            assert_eq!(fx.base_of("d"), name("n"));
            assert_eq!(fx.store.log().last().unwrap(), "insert branch n above b");
        }

        #[test]
        fn failed_restore_is_merged_with_cause() {
            let fx = Fixture::new("b");
            let vcs = fx.vcs.clone().fail_always(MockOp::Checkout);
            let err = BranchCreator::new(&vcs, &fx.store, &fx.restack)
                .create(&request("n", InsertMode::Append))
                .unwrap_err();

            match err {
                CreateError::RestoreFailed { cause, branch, .. } => {
                    assert_eq!(branch, name("b"));
                    assert!(matches!(
                        *cause,
                        CreateError::Backend { stage: Stage::CheckoutBranch, .. }
                    ));
                }
                other => panic!("expected RestoreFailed, got {other:?}"),
            }
        }
    }

    mod cancellation {
        use super::*;

        #[test]
        fn cancelled_before_start_changes_nothing() {
            let fx = Fixture::new("b");
            let cancel = Cancellation::new();
            cancel.cancel();

            let err = fx
                .creator()
                .with_cancellation(cancel)
                .create(&request("n", InsertMode::Append))
                .unwrap_err();

            assert!(matches!(err, CreateError::Cancelled { stage: Stage::Resolve }));
            assert!(fx.vcs.calls().is_empty());
        }

        /// Cancels as soon as HEAD is detached.
        struct CancelOnDetach {
            vcs: MockVcs,
            cancel: Cancellation,
        }

        impl VersionControl for CancelOnDetach {
            fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
                self.vcs.current_branch()
            }
            fn peel_to_commit(&self, rev: &str) -> Result<Oid, GitError> {
                self.vcs.peel_to_commit(rev)
            }
            fn diff_index(&self, tree_ish: &Oid) -> Result<Vec<String>, GitError> {
                self.vcs.diff_index(tree_ish)
            }
            fn detach_head(&self, target: &Oid) -> Result<(), GitError> {
                self.vcs.detach_head(target)?;
                self.cancel.cancel();
                Ok(())
            }
            fn commit(&self, request: &CommitRequest) -> Result<Oid, GitError> {
                self.vcs.commit(request)
            }
            fn create_branch(&self, name: &BranchName, head: &Oid) -> Result<(), GitError> {
                self.vcs.create_branch(name, head)
            }
            fn checkout(&self, name: &BranchName) -> Result<(), GitError> {
                self.vcs.checkout(name)
            }
        }

        #[test]
        fn cancelled_after_detach_restores_branch() {
            let fx = Fixture::new("b");
            let cancel = Cancellation::new();
            let vcs = CancelOnDetach {
                vcs: fx.vcs.clone(),
                cancel: cancel.clone(),
            };

            let err = BranchCreator::new(&vcs, &fx.store, &fx.restack)
                .with_cancellation(cancel)
                .create(&request("n", InsertMode::Append))
                .unwrap_err();

            assert!(matches!(err, CreateError::Cancelled { stage: Stage::Commit }));
            assert_eq!(fx.vcs.head(), MockHead::Branch(name("b")));
            assert!(fx.vcs.commits().is_empty());
            assert_eq!(fx.store.log(), vec!["setup"]);
        }

        #[test]
        fn cancelled_during_restack_restores_branch() {
            let fx = Fixture::new("b");
            let cancel = Cancellation::new();
            let restack = CancelOnCall(cancel.clone());
            // Cancel from inside the restack so every earlier step has run.
            let err = BranchCreator::new(&fx.vcs, &fx.store, &restack)
                .with_cancellation(cancel)
                .create(&request("n", InsertMode::InsertAbove))
                .unwrap_err();

            assert!(matches!(err, CreateError::Restack(RestackError::Cancelled { .. })));
            assert_eq!(fx.vcs.head(), MockHead::Branch(name("b")));
        }

        struct CancelOnCall(Cancellation);

        impl RestackEngine for CancelOnCall {
            fn restack_upstack_of_current(&self, cancel: &Cancellation) -> Result<(), RestackError> {
                self.0.cancel();
                assert!(cancel.is_cancelled());
                Err(RestackError::Cancelled { next: name("d") })
            }
        }
    }

    mod planning {
        use super::*;

        #[test]
        fn plan_orders_new_record_first() {
            let fx = Fixture::new("b");
            let head = fx.vcs.tip(&name("b")).unwrap();
            let plan = plan_insertion(
                &fx.store,
                InsertMode::InsertAbove,
                &name("n"),
                &name("b"),
                &head,
            )
            .unwrap();

            assert_eq!(plan.upserts[0].name, name("n"));
            assert_eq!(plan.upserts[0].base_hash, Some(head));
            assert!(plan.upserts[1..].iter().all(|u| u.base_hash.is_none()));
        }

        #[test]
        fn mode_from_flags() {
            assert_eq!(InsertMode::from_flags(false, false), InsertMode::Append);
            assert_eq!(InsertMode::from_flags(true, false), InsertMode::InsertAbove);
            assert_eq!(InsertMode::from_flags(false, true), InsertMode::InsertBelow);
            assert_eq!(InsertMode::from_flags(true, true), InsertMode::InsertBelow);
        }
    }
}
