//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! Messages meant for the user go through here and honor `--quiet`.
//! Diagnostics go through `tracing` instead.

pub mod output;
