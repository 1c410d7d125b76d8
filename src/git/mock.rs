//! git::mock
//!
//! Scripted in-memory [`VersionControl`] for deterministic testing.
//!
//! # Design
//!
//! `MockVcs` models just enough of a repository for the branch engine:
//! branch tips, HEAD (attached or detached), a staged-path list, and a
//! commit counter. Any operation can be told to fail, once or for good,
//! and every call is recorded so tests can assert on the exact sequence.
//!
//! # Example
//!
//! ```ignore
//! use gstack::git::mock::{MockVcs, MockOp};
//! use gstack::git::VersionControl;
//! use gstack::core::types::BranchName;
//!
//! let main = BranchName::new("main").unwrap();
//! let vcs = MockVcs::new().with_branch(&main).on_branch(&main);
//!
//! assert_eq!(vcs.current_branch().unwrap(), Some(main.clone()));
//!
//! let vcs = vcs.fail_once(MockOp::Checkout);
//! assert!(vcs.checkout(&main).is_err());
//! assert!(vcs.checkout(&main).is_ok());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use super::backend::{CommitRequest, VersionControl};
use super::GitError;
use crate::core::types::{BranchName, Oid};

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    CurrentBranch,
    PeelToCommit,
    DiffIndex,
    DetachHead,
    Commit,
    CreateBranch,
    Checkout,
}

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockHead {
    /// HEAD is unborn.
    Unborn,
    /// HEAD is attached to a branch.
    Branch(BranchName),
    /// HEAD points directly at a commit.
    Detached(Oid),
}

/// A commit made through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCommit {
    pub oid: Oid,
    pub parent: Oid,
    pub message: String,
    /// Whether the commit carried no staged changes
    pub empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Once,
    Always,
}

/// Mock version control backend.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping, so clones share state.
#[derive(Debug, Clone)]
pub struct MockVcs {
    inner: Arc<Mutex<MockVcsInner>>,
}

#[derive(Debug)]
struct MockVcsInner {
    head: MockHead,
    branches: BTreeMap<BranchName, Oid>,
    staged: Vec<String>,
    commits: Vec<MockCommit>,
    next_oid: u64,
    failures: HashMap<MockOp, Failure>,
    calls: Vec<String>,
}

impl MockVcsInner {
    fn fresh_oid(&mut self) -> Oid {
        self.next_oid += 1;
        Oid::new(format!("{:040x}", self.next_oid)).unwrap()
    }

    fn head_oid(&self) -> Result<Oid, GitError> {
        match &self.head {
            MockHead::Unborn => Err(GitError::RefNotFound {
                refname: "HEAD".into(),
            }),
            MockHead::Detached(oid) => Ok(oid.clone()),
            MockHead::Branch(name) => {
                self.branches
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GitError::RefNotFound {
                        refname: name.ref_name(),
                    })
            }
        }
    }

    fn check(&mut self, op: MockOp, call: String) -> Result<(), GitError> {
        self.calls.push(call);
        match self.failures.get(&op).copied() {
            None => Ok(()),
            Some(failure) => {
                if failure == Failure::Once {
                    self.failures.remove(&op);
                }
                Err(GitError::Internal {
                    message: format!("injected {:?} failure", op),
                })
            }
        }
    }
}

impl MockVcs {
    /// Create an empty mock with an unborn HEAD.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockVcsInner {
                head: MockHead::Unborn,
                branches: BTreeMap::new(),
                staged: Vec::new(),
                commits: Vec::new(),
                next_oid: 0,
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Add a branch at a fresh commit.
    pub fn with_branch(self, name: &BranchName) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let oid = inner.fresh_oid();
            inner.branches.insert(name.clone(), oid);
        }
        self
    }

    /// Attach HEAD to `name`.
    pub fn on_branch(self, name: &BranchName) -> Self {
        self.inner.lock().unwrap().head = MockHead::Branch(name.clone());
        self
    }

    /// Detach HEAD at `oid`.
    pub fn detached_at(self, oid: &Oid) -> Self {
        self.inner.lock().unwrap().head = MockHead::Detached(oid.clone());
        self
    }

    /// Pretend `paths` are staged.
    pub fn with_staged(self, paths: &[&str]) -> Self {
        self.inner.lock().unwrap().staged = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Fail the next call to `op`.
    pub fn fail_once(self, op: MockOp) -> Self {
        self.inner.lock().unwrap().failures.insert(op, Failure::Once);
        self
    }

    /// Fail every call to `op`.
    pub fn fail_always(self, op: MockOp) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert(op, Failure::Always);
        self
    }

    /// Current HEAD.
    pub fn head(&self) -> MockHead {
        self.inner.lock().unwrap().head.clone()
    }

    /// Tip of a branch, if it exists.
    pub fn tip(&self, name: &BranchName) -> Option<Oid> {
        self.inner.lock().unwrap().branches.get(name).cloned()
    }

    /// Commits made so far, oldest first.
    pub fn commits(&self) -> Vec<MockCommit> {
        self.inner.lock().unwrap().commits.clone()
    }

    /// Every call, in order, as `op(args)` strings.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }
}

impl Default for MockVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionControl for MockVcs {
    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(MockOp::CurrentBranch, "current_branch".into())?;
        Ok(match &inner.head {
            MockHead::Branch(name) => Some(name.clone()),
            _ => None,
        })
    }

    fn peel_to_commit(&self, rev: &str) -> Result<Oid, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(MockOp::PeelToCommit, format!("peel_to_commit({rev})"))?;
        if rev == "HEAD" {
            return inner.head_oid();
        }
        let name = BranchName::new(rev)?;
        inner
            .branches
            .get(&name)
            .cloned()
            .ok_or_else(|| GitError::RefNotFound {
                refname: name.ref_name(),
            })
    }

    fn diff_index(&self, tree_ish: &Oid) -> Result<Vec<String>, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(MockOp::DiffIndex, format!("diff_index({})", tree_ish.short(7)))?;
        Ok(inner.staged.clone())
    }

    fn detach_head(&self, target: &Oid) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(MockOp::DetachHead, format!("detach_head({})", target.short(7)))?;
        inner.head = MockHead::Detached(target.clone());
        Ok(())
    }

    fn commit(&self, request: &CommitRequest) -> Result<Oid, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(MockOp::Commit, format!("commit({})", request.message))?;

        let empty = inner.staged.is_empty();
        if empty && !request.allow_empty {
            return Err(GitError::NothingToCommit);
        }

        let parent = inner.head_oid()?;
        let oid = inner.fresh_oid();
        inner.commits.push(MockCommit {
            oid: oid.clone(),
            parent,
            message: request.message.clone(),
            empty,
        });
        inner.staged.clear();

        match inner.head.clone() {
            MockHead::Branch(name) => {
                inner.branches.insert(name, oid.clone());
            }
            _ => inner.head = MockHead::Detached(oid.clone()),
        }
        Ok(oid)
    }

    fn create_branch(&self, name: &BranchName, head: &Oid) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(
            MockOp::CreateBranch,
            format!("create_branch({}, {})", name, head.short(7)),
        )?;
        if inner.branches.contains_key(name) {
            return Err(GitError::BranchExists { name: name.clone() });
        }
        inner.branches.insert(name.clone(), head.clone());
        Ok(())
    }

    fn checkout(&self, name: &BranchName) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(MockOp::Checkout, format!("checkout({name})"))?;
        if !inner.branches.contains_key(name) {
            return Err(GitError::RefNotFound {
                refname: name.ref_name(),
            });
        }
        inner.head = MockHead::Branch(name.clone());
        Ok(())
    }
}
