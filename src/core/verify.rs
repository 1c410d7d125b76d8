//! core::verify
//!
//! Structural verification of the stack forest.
//!
//! Every state transaction is checked here before it is published:
//!
//! - trunk is never a tracked record
//! - every base is trunk or another tracked branch
//! - the base relation is acyclic, so every chain ends at trunk
//!
//! # Invariants
//!
//! - Never mutates anything
//! - Deterministic: errors come out in branch-name order

use super::graph::StackGraph;
use super::types::BranchName;
use thiserror::Error;

/// A single structural problem in the forest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("cycle detected in stack graph at branch: {0}")]
    CycleDetected(BranchName),

    #[error("trunk '{0}' cannot be tracked as a stacked branch")]
    TrunkTracked(BranchName),

    #[error("branch '{branch}' is based on '{base}', which is neither trunk nor tracked")]
    UnknownBase { branch: BranchName, base: BranchName },
}

/// Outcome of verifying a forest.
#[derive(Debug)]
pub struct VerifyResult {
    /// Problems found, empty when the forest is sound
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<(), VerifyError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Verify that `graph` is a forest rooted at `trunk`.
pub fn verify_forest(graph: &StackGraph, trunk: &BranchName) -> VerifyResult {
    let mut errors = Vec::new();

    if graph.contains(trunk) {
        errors.push(VerifyError::TrunkTracked(trunk.clone()));
    }

    for branch in graph.branches() {
        if let Some(base) = graph.parent(branch) {
            if base != trunk && !graph.contains(base) {
                errors.push(VerifyError::UnknownBase {
                    branch: branch.clone(),
                    base: base.clone(),
                });
            }
        }
    }

    if let Some(branch) = graph.find_cycle() {
        errors.push(VerifyError::CycleDetected(branch));
    }

    VerifyResult { errors }
}
