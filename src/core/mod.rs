//! core
//!
//! Core domain types, schemas, and stack state for gstack.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, UtcTimestamp
//! - [`graph`] - Stack graph representation and traversal
//! - [`verify`] - Forest invariants (trunk-rooted, acyclic)
//! - [`state`] - Persisted stack state and the store contract
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Repo-scoped file locations
//! - [`cancel`] - Cooperative cancellation
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - All verification is deterministic

pub mod cancel;
pub mod config;
pub mod graph;
pub mod paths;
pub mod state;
pub mod types;
pub mod verify;
