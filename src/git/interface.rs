//! git::interface
//!
//! Git interface implementation using git2.
//!
//! # Architecture
//!
//! `Git` wraps a `git2::Repository` and is the only type in the crate that
//! touches `git2`. It serves two callers:
//!
//! - the branch engine, through the [`VersionControl`] trait
//! - the state store, through the object and CAS ref helpers below
//!
//! The one exception to "git2 only" is [`Git::rebase_onto`], which runs the
//! `git` executable because libgit2 has no porcelain rebase with conflict
//! stops that users can resume from the command line.
//!
//! # Error Handling
//!
//! Failures are normalized into [`GitError`] categories:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//! - [`GitError::BranchExists`]: Branch creation would clobber a branch
//! - [`GitError::NothingToCommit`]: Index matches HEAD and empty commits are off
//! - [`GitError::OperationInProgress`]: A rebase stopped on conflicts
//!
//! # Example
//!
//! ```ignore
//! use gstack::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let oid = git.resolve_ref("refs/heads/main")?;
//! println!("main is at {}", oid.short(7));
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use super::backend::{CommitRequest, VersionControl};
use crate::core::types::{BranchName, Oid, TypeError, UtcTimestamp};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// HEAD does not name a branch.
    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// A branch with this name already exists.
    #[error("branch '{name}' already exists")]
    BranchExists {
        /// The conflicting branch
        name: BranchName,
    },

    /// The index has no changes and an empty commit was not allowed.
    #[error("nothing to commit")]
    NothingToCommit,

    /// Git operation in progress (rebase, merge, etc.).
    #[error("{operation} in progress")]
    OperationInProgress {
        /// The type of operation in progress
        operation: GitState,
    },

    /// Local changes would be overwritten by a checkout.
    #[error("working tree is dirty: {details}")]
    DirtyWorktree {
        /// Description of what's dirty
        details: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID or path that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref or branch name.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Blob content is not valid UTF-8.
    #[error("blob is not valid UTF-8: {oid}")]
    InvalidUtf8 {
        /// The OID of the blob
        oid: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// An external `git` invocation failed.
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        /// The command that was run
        command: String,
        /// Trimmed standard error
        stderr: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec if context.starts_with("refs/") => {
                GitError::InvalidRefName {
                    message: format!("{}: {}", context, err.message()),
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Conflict => GitError::DirtyWorktree {
                details: format!("{}: {}", context, err.message()),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the per-worktree .git directory
    pub git_dir: PathBuf,
    /// Path to the git directory shared by all worktrees
    pub common_dir: PathBuf,
    /// Path to working directory
    pub work_dir: PathBuf,
}

/// State of in-progress Git operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Rebase in progress.
    Rebase,
    /// Merge in progress.
    Merge,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert, bisect, or mailbox apply in progress.
    Other,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// ```
    /// use gstack::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Rebase.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Other => "git operation",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Committer timestamp
    pub time: UtcTimestamp,
}

/// The Git interface.
///
/// Every repository read and write in the crate goes through this type.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Get repository paths.
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        Ok(RepoInfo {
            git_dir: self.repo.path().to_path_buf(),
            common_dir: self.repo.commondir().to_path_buf(),
            work_dir: self.work_dir()?.to_path_buf(),
        })
    }

    fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    /// Get the current Git state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge
            | git2::RepositoryState::ApplyMailboxOrRebase => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            _ => GitState::Other,
        }
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Ok(Oid::new(oid.to_string())?)
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Tip commit of a local branch.
    pub fn branch_tip(&self, branch: &BranchName) -> Result<Oid, GitError> {
        self.resolve_ref(&branch.ref_name())
    }

    /// Check if a ref exists.
    pub fn ref_exists(&self, refname: &str) -> bool {
        self.repo.find_reference(refname).is_ok()
    }

    /// Direct target of a ref, without validation. `None` if absent.
    fn try_resolve_ref_raw(&self, refname: &str) -> Result<Option<git2::Oid>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", refname),
                })?;
                Ok(Some(oid))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    // =========================================================================
    // CAS Ref Operations
    // =========================================================================

    /// Update a ref with compare-and-swap semantics.
    ///
    /// `expected_old = None` means the ref must not exist yet. The final write
    /// goes through libgit2's matching update, so a writer that slips in
    /// between the check and the write still loses.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match expected
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        let current = self.try_resolve_ref_raw(refname)?;
        let describe = |oid: Option<String>| oid.unwrap_or_else(|| "<none>".to_string());

        let matches = match (expected_old, current) {
            (Some(expected), Some(actual)) => expected.as_str() == actual.to_string(),
            (None, None) => true,
            _ => false,
        };
        if !matches {
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: describe(expected_old.map(|o| o.to_string())),
                actual: describe(current.map(|o| o.to_string())),
            });
        }

        let new = to_git2(new_oid)?;
        let written = match expected_old {
            Some(expected) => {
                self.repo
                    .reference_matching(refname, new, true, to_git2(expected)?, message)
            }
            None => self.repo.reference(refname, new, false, message),
        };

        written.map(|_| ()).map_err(|e| match e.code() {
            git2::ErrorCode::Modified | git2::ErrorCode::Exists => GitError::CasFailed {
                refname: refname.to_string(),
                expected: describe(expected_old.map(|o| o.to_string())),
                actual: "<changed concurrently>".to_string(),
            },
            _ => GitError::from_git2(e, refname),
        })
    }

    // =========================================================================
    // Object Operations
    // =========================================================================

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        self.repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    /// Write a commit holding a single file, without moving any ref.
    ///
    /// Used for the state store, whose history is a chain of such commits.
    pub fn write_file_commit(
        &self,
        file_name: &str,
        contents: &[u8],
        parent: Option<&Oid>,
        message: &str,
    ) -> Result<Oid, GitError> {
        let blob = self.repo.blob(contents)?;
        let mut builder = self.repo.treebuilder(None)?;
        builder.insert(file_name, blob, i32::from(git2::FileMode::Blob))?;
        let tree = self.repo.find_tree(builder.write()?)?;

        let parents = parent
            .map(|oid| self.find_commit(oid))
            .transpose()?
            .into_iter()
            .collect::<Vec<_>>();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let sig = self.signature()?;
        let oid = self
            .repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)?;
        Ok(Oid::new(oid.to_string())?)
    }

    /// Read a file from the root tree of a commit as UTF-8.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit has no such file
    /// - [`GitError::InvalidUtf8`] if the file is not valid UTF-8
    pub fn read_commit_file(&self, commit: &Oid, file_name: &str) -> Result<String, GitError> {
        let tree = self.find_commit(commit)?.tree()?;
        let entry = tree
            .get_name(file_name)
            .ok_or_else(|| GitError::ObjectNotFound {
                oid: format!("{}:{}", commit, file_name),
            })?;
        let blob = self
            .repo
            .find_blob(entry.id())
            .map_err(|e| GitError::from_git2(e, file_name))?;

        String::from_utf8(blob.content().to_vec()).map_err(|_| GitError::InvalidUtf8 {
            oid: entry.id().to_string(),
        })
    }

    /// Get information about a commit.
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self.find_commit(oid)?;
        Ok(CommitInfo {
            oid: oid.clone(),
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            time: UtcTimestamp::from_unix(commit.time().seconds()),
        })
    }

    /// First-parent history starting at `tip`, newest first.
    pub fn log(&self, tip: &Oid, limit: usize) -> Result<Vec<CommitInfo>, GitError> {
        let mut walk = self.repo.revwalk()?;
        walk.push(to_git2(tip)?)?;
        walk.simplify_first_parent()?;

        walk.take(limit)
            .map(|oid| self.commit_info(&Oid::new(oid?.to_string())?))
            .collect()
    }

    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(git2::Signature::now("gstack", "gstack@localhost")?),
        }
    }

    // =========================================================================
    // Working Tree
    // =========================================================================

    fn checkout_commit(&self, commit: &git2::Commit<'_>, context: &str) -> Result<(), GitError> {
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, context))
    }

    /// Rebase `branch` so the commits after `upstream` sit on `onto`.
    ///
    /// Uncommitted changes are stashed for the rebase and reapplied after it.
    /// Leaves `branch` checked out on success.
    ///
    /// # Errors
    ///
    /// - [`GitError::OperationInProgress`] if the rebase stopped on conflicts
    /// - [`GitError::CommandFailed`] for any other failure
    pub fn rebase_onto(&self, onto: &Oid, upstream: &Oid, branch: &BranchName) -> Result<(), GitError> {
        debug!(%branch, onto = onto.short(7), upstream = upstream.short(7), "git rebase --onto");

        let output = Command::new("git")
            .args([
                "rebase",
                "--autostash",
                "--onto",
                onto.as_str(),
                upstream.as_str(),
                branch.as_str(),
            ])
            .current_dir(self.work_dir()?)
            .output()
            .map_err(|e| GitError::AccessError {
                message: format!("failed to run git: {}", e),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let state = self.state();
        if state.is_in_progress() {
            return Err(GitError::OperationInProgress { operation: state });
        }
        Err(GitError::CommandFailed {
            command: format!("git rebase --onto {} {} {}", onto.short(7), upstream.short(7), branch),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl VersionControl for Git {
    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    fn peel_to_commit(&self, rev: &str) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .revparse_single(rev)
            .and_then(|object| object.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, rev))?;
        Ok(Oid::new(commit.id().to_string())?)
    }

    fn diff_index(&self, tree_ish: &Oid) -> Result<Vec<String>, GitError> {
        let tree = self.find_commit(tree_ish)?.tree()?;
        let mut index = self.repo.index()?;
        index.read(false)?;

        let diff = self
            .repo
            .diff_tree_to_index(Some(&tree), Some(&index), None)?;

        Ok(diff
            .deltas()
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect())
    }

    fn detach_head(&self, target: &Oid) -> Result<(), GitError> {
        let commit = self.find_commit(target)?;
        self.checkout_commit(&commit, target.as_str())?;
        self.repo
            .set_head_detached(commit.id())
            .map_err(|e| GitError::from_git2(e, "HEAD"))
    }

    fn commit(&self, request: &CommitRequest) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        let tree_id = index.write_tree()?;

        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        if !request.allow_empty && head.tree_id() == tree_id {
            return Err(GitError::NothingToCommit);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, &request.message, &tree, &[&head])?;
        Ok(Oid::new(oid.to_string())?)
    }

    fn create_branch(&self, name: &BranchName, head: &Oid) -> Result<(), GitError> {
        let commit = self.find_commit(head)?;
        self.repo
            .branch(name.as_str(), &commit, false)
            .map(|_| ())
            .map_err(|e| match e.code() {
                git2::ErrorCode::Exists => GitError::BranchExists { name: name.clone() },
                _ => GitError::from_git2(e, &name.ref_name()),
            })
    }

    fn checkout(&self, name: &BranchName) -> Result<(), GitError> {
        let refname = name.ref_name();
        let commit = self
            .repo
            .find_reference(&refname)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, &refname))?;

        self.checkout_commit(&commit, &refname)?;
        self.repo
            .set_head(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))
    }
}

fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}
