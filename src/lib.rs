//! gstack - stacked branches on plain git
//!
//! A single binary, `gs`, that tracks which branch each branch is stacked
//! on and keeps stacks consistent as branches are created, inserted, and
//! restacked.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Branch creation, restack, and rollback
//! - [`core`] - Domain types, stack state, verification, and configuration
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! gstack maintains the following invariants:
//!
//! 1. Tracked branches form a forest rooted at trunk
//! 2. Stack state changes are published atomically, one transaction at a time
//! 3. A failed command leaves the user on the branch they started from

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
