//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and the stores it needs
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT perform repository mutations directly.

mod completion;
mod create;
mod init;
mod restack;

pub use completion::completion;
pub use create::create;
pub use init::init;
pub use restack::restack;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::engine::Context;
use crate::git::Git;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init { trunk, force } => init::init(ctx, trunk.as_deref(), force),
        Command::Create {
            name,
            message,
            insert,
            below,
        } => create::create(ctx, name.as_deref(), message.as_deref(), insert, below),
        Command::Restack => restack::restack(ctx),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Open the repository the context points at.
fn open_repo(ctx: &Context) -> Result<Git> {
    let dir = ctx.work_dir();
    Git::open(&dir).with_context(|| format!("failed to open repository at {}", dir.display()))
}
