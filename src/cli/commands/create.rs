//! create command - Create a branch in the current stack

use anyhow::Result;

use super::open_repo;
use crate::core::state::GitStateStore;
use crate::engine::create::{BranchCreator, CreateRequest, InsertMode};
use crate::engine::restack::UpstackRestacker;
use crate::engine::Context;
use crate::ui::output::{self, format_list, Verbosity};

/// Create a branch and check it out.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `name` - Name for the new branch
/// * `message` - Commit message; the branch name when absent
/// * `insert` - Move the current branch's children onto the new branch
/// * `below` - Insert below the current branch (implies `insert`)
pub fn create(
    ctx: &Context,
    name: Option<&str>,
    message: Option<&str>,
    insert: bool,
    below: bool,
) -> Result<()> {
    let git = open_repo(ctx)?;
    let store = GitStateStore::open(&git)?;
    let restacker = UpstackRestacker::new(&git, &store);

    let request = CreateRequest {
        name: name.map(String::from),
        mode: InsertMode::from_flags(insert, below),
        message: message.map(String::from),
    };

    let outcome = BranchCreator::new(&git, &store, &restacker)
        .with_cancellation(ctx.cancel.clone())
        .create(&request)?;

    let verbosity = Verbosity::from_context(ctx);
    output::success(
        format!("Created '{}' on '{}'", outcome.branch, outcome.base.name),
        verbosity,
    );
    if outcome.empty_commit {
        output::print("Nothing was staged; the branch starts with an empty commit.", verbosity);
    }
    if !outcome.moved.is_empty() {
        output::print(
            format!(
                "Moved onto '{}':\n{}",
                outcome.branch,
                format_list(&outcome.moved, "  ")
            ),
            verbosity,
        );
    }
    Ok(())
}
