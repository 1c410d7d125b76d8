//! engine
//!
//! Operations that change branches and stack state together.
//!
//! # Architecture
//!
//! The engine sits between the CLI and the two stores it coordinates:
//! the working checkout, reached through [`crate::git::VersionControl`],
//! and stack state, reached through [`crate::core::state::StackStore`].
//! Both arrive as trait objects, so each operation runs the same way
//! against a real repository or against the in-memory doubles used in
//! tests.
//!
//! - [`create`] - Creating a branch, appended or inserted into a stack
//! - [`restack`] - Rebasing branches back onto their bases
//! - [`rollback`] - Returning HEAD to the starting branch on failure
//!
//! # Invariants
//!
//! - Stack state changes only through one store transaction per step
//! - A failure after HEAD moves puts HEAD back where the user started
//! - Every operation checks [`crate::core::cancel::Cancellation`] between steps
//!
//! # Example
//!
//! ```ignore
//! use gstack::engine::create::{BranchCreator, CreateRequest};
//! use gstack::engine::restack::UpstackRestacker;
//!
//! let restacker = UpstackRestacker::new(&git, &store);
//! let outcome = BranchCreator::new(&git, &store, &restacker)
//!     .with_cancellation(ctx.cancel.clone())
//!     .create(&request)?;
//! ```

pub mod create;
pub mod restack;
pub mod rollback;

pub use create::{BranchCreator, CreateError, CreateOutcome, CreateRequest, InsertMode};
pub use restack::{RestackEngine, RestackError, UpstackRestacker};
pub use rollback::{RestorePoint, RollbackError};

use std::path::PathBuf;

use crate::core::cancel::Cancellation;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags and configuration.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Flipped when the user interrupts.
    pub cancel: Cancellation,
}

impl Context {
    /// Directory commands operate in.
    pub fn work_dir(&self) -> PathBuf {
        self.cwd.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
