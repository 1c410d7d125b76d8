//! restack command - Rebase the current branch and its descendants

use anyhow::Result;

use super::open_repo;
use crate::core::state::GitStateStore;
use crate::engine::restack::UpstackRestacker;
use crate::engine::Context;
use crate::ui::output::{self, format_list, Verbosity};

/// Restack the current branch and everything above it.
pub fn restack(ctx: &Context) -> Result<()> {
    let git = open_repo(ctx)?;
    let store = GitStateStore::open(&git)?;
    let restacked = UpstackRestacker::new(&git, &store).run(&ctx.cancel)?;

    let verbosity = Verbosity::from_context(ctx);
    if restacked.is_empty() {
        output::print("Nothing to restack.", verbosity);
    } else {
        output::success(format!("Restacked:\n{}", format_list(&restacked, "  ")), verbosity);
    }
    Ok(())
}
