//! core::state::schema
//!
//! On-disk form of the stack state (v1).
//!
//! # Schema Design
//!
//! - Self-describing: includes `kind` and `schema_version`
//! - Strict parsing: unknown fields are rejected
//! - One document for the whole forest, so a transaction is one write
//!
//! ```json
//! {
//!   "kind": "gstack.state",
//!   "schema_version": 1,
//!   "trunk": "main",
//!   "branches": {
//!     "feature": {
//!       "base": { "name": "main", "hash": "abc1..." },
//!       "created_at": "2024-01-01T00:00:00Z",
//!       "updated_at": "2024-01-01T00:00:00Z"
//!     }
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use gstack::core::state::schema::{parse_state, StateV1};
//! use gstack::core::types::BranchName;
//!
//! let state = StateV1::new(BranchName::new("main").unwrap());
//! let json = state.to_canonical_json().unwrap();
//! let parsed = parse_state(&json).unwrap();
//! assert_eq!(parsed.trunk.as_str(), "main");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Branch, BranchBase, StoreError, UpsertBranchRequest};
use crate::core::graph::StackGraph;
use crate::core::types::{BranchName, Oid, UtcTimestamp};
use crate::core::verify::verify_forest;

/// The kind identifier for the state document.
pub const STATE_KIND: &str = "gstack.state";

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from decoding the state document.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to parse state: {0}")]
    ParseError(String),

    #[error("invalid kind '{found}', expected '{}'", STATE_KIND)]
    InvalidKind { found: String },

    #[error("unsupported schema version {0}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),

    #[error("failed to serialize state: {0}")]
    SerializeError(String),
}

/// Envelope for version dispatch before full parsing.
#[derive(Debug, Deserialize)]
struct StateEnvelope {
    kind: String,
    schema_version: u32,
}

/// Parse the state document with version dispatch.
///
/// # Errors
///
/// Returns an error if the JSON is malformed, the `kind` is wrong, or the
/// `schema_version` is not supported.
pub fn parse_state(json: &str) -> Result<StateV1, StateError> {
    let envelope: StateEnvelope =
        serde_json::from_str(json).map_err(|e| StateError::ParseError(e.to_string()))?;

    if envelope.kind != STATE_KIND {
        return Err(StateError::InvalidKind {
            found: envelope.kind,
        });
    }

    match envelope.schema_version {
        1 => serde_json::from_str(json).map_err(|e| StateError::ParseError(e.to_string())),
        v => Err(StateError::UnsupportedVersion(v)),
    }
}

/// The whole stack forest (v1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StateV1 {
    /// Kind identifier (always "gstack.state")
    pub kind: String,

    /// Schema version (always 1 for this struct)
    pub schema_version: u32,

    /// The trunk every stack is rooted at
    pub trunk: BranchName,

    /// Tracked branches by name
    #[serde(default)]
    pub branches: BTreeMap<BranchName, BranchRecord>,
}

/// One tracked branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BranchRecord {
    pub base: BaseRecord,
    pub created_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,
}

/// Where a branch sits: its base branch and that base's commit when last fixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BaseRecord {
    pub name: BranchName,
    pub hash: Oid,
}

impl StateV1 {
    /// Empty forest rooted at `trunk`.
    pub fn new(trunk: BranchName) -> Self {
        Self {
            kind: STATE_KIND.to_string(),
            schema_version: SCHEMA_VERSION,
            trunk,
            branches: BTreeMap::new(),
        }
    }

    /// Serialize to pretty, key-sorted JSON.
    pub fn to_canonical_json(&self) -> Result<String, StateError> {
        serde_json::to_string_pretty(self).map_err(|e| StateError::SerializeError(e.to_string()))
    }

    /// Parent/children index over the tracked branches.
    pub fn graph(&self) -> StackGraph {
        StackGraph::from_edges(
            self.branches
                .iter()
                .map(|(name, record)| (name, &record.base.name)),
        )
    }

    pub fn branch(&self, name: &BranchName) -> Option<Branch> {
        self.branches.get(name).map(|record| Branch {
            name: name.clone(),
            base: BranchBase {
                name: record.base.name.clone(),
                hash: record.base.hash.clone(),
            },
        })
    }

    /// Direct children of `name`, in name order.
    pub fn children_of(&self, name: &BranchName) -> Vec<BranchName> {
        self.graph().children(name)
    }

    /// Apply a batch of upserts in order, then verify the resulting forest.
    ///
    /// On error `self` is left untouched.
    ///
    /// # Errors
    ///
    /// - [`StoreError::MissingBaseHash`] if a new branch has no base hash
    /// - [`StoreError::Invalid`] if the result is not a trunk-rooted forest
    pub fn apply(&mut self, batch: &[UpsertBranchRequest]) -> Result<(), StoreError> {
        let mut next = self.branches.clone();
        let now = UtcTimestamp::now();

        for request in batch {
            match next.get_mut(&request.name) {
                Some(record) => {
                    record.base.name = request.base.clone();
                    if let Some(hash) = &request.base_hash {
                        record.base.hash = hash.clone();
                    }
                    record.updated_at = now.clone();
                }
                None => {
                    let hash = request
                        .base_hash
                        .clone()
                        .ok_or_else(|| StoreError::MissingBaseHash(request.name.clone()))?;
                    next.insert(
                        request.name.clone(),
                        BranchRecord {
                            base: BaseRecord {
                                name: request.base.clone(),
                                hash,
                            },
                            created_at: now.clone(),
                            updated_at: now.clone(),
                        },
                    );
                }
            }
        }

        let graph = StackGraph::from_edges(next.iter().map(|(name, r)| (name, &r.base.name)));
        verify_forest(&graph, &self.trunk).into_result()?;

        self.branches = next;
        Ok(())
    }

    /// Switch to a new trunk, dropping records that no longer fit.
    ///
    /// A record for the new trunk is removed, and so is anything whose base
    /// chain breaks as a result. Returns the dropped branches.
    pub fn retrunk(&mut self, trunk: BranchName) -> Vec<BranchName> {
        self.trunk = trunk;
        let mut dropped = Vec::new();

        if self.branches.remove(&self.trunk).is_some() {
            dropped.push(self.trunk.clone());
        }

        loop {
            let orphans: Vec<BranchName> = self
                .branches
                .iter()
                .filter(|(_, r)| r.base.name != self.trunk && !self.branches.contains_key(&r.base.name))
                .map(|(name, _)| name.clone())
                .collect();
            if orphans.is_empty() {
                break;
            }
            for name in orphans {
                self.branches.remove(&name);
                dropped.push(name);
            }
        }

        dropped
    }
}
