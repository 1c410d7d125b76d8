//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gstack - stacked branches on plain git
#[derive(Parser, Debug)]
#[command(name = "gs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if gs was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize stack tracking in this repository
    #[command(
        name = "init",
        long_about = "Initialize stack tracking in a git repository.\n\n\
            Records the trunk branch that every stack is rooted at. Run this once \
            per repository before creating branches.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Use the configured trunk, or the current branch
    gs init

    # Specify trunk explicitly
    gs init --trunk develop

    # Move an initialized repository to a different trunk
    gs init --trunk main --force"
    )]
    Init {
        /// Trunk branch (default: repo config, then the current branch)
        #[arg(long)]
        trunk: Option<String>,

        /// Re-initialize an already initialized repository
        #[arg(long)]
        force: bool,
    },

    /// Create a new branch in the current stack
    #[command(
        name = "create",
        visible_alias = "c",
        long_about = "Create a new branch stacked on the current branch.\n\n\
            Staged changes are committed to the new branch. With nothing staged, \
            the branch starts with an empty commit. The new branch is checked out \
            and tracked with the current branch as its base.\n\n\
            With --insert, branches stacked on the current branch move onto the \
            new one. With --below, the new branch goes between the current branch \
            and its base instead. Moved branches are restacked.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Commit staged changes to a new branch
    git add src/
    gs create parser -m \"add parser\"

    # Insert a branch between the current branch and its children
    gs create refactor --insert

    # Insert a branch below the current branch
    gs create prep --below

IF SOMETHING FAILS:
    The original branch is checked out again. If a restack stops on
    conflicts, resolve them, run 'git rebase --continue', then 'gs restack'."
    )]
    Create {
        /// Name for the new branch
        name: Option<String>,

        /// Commit message (default: the branch name)
        #[arg(short, long)]
        message: Option<String>,

        /// Move the current branch's children onto the new branch
        #[arg(long)]
        insert: bool,

        /// Insert below the current branch instead of above (implies --insert)
        #[arg(long)]
        below: bool,
    },

    /// Rebase the current branch and its descendants onto their bases
    #[command(
        name = "restack",
        long_about = "Rebase tracked branches to align with their base branch tips.\n\n\
            Restacks the current branch and everything stacked on it, parents \
            first. Branches already on their base's tip are left alone.",
        after_help = "\
HANDLING CONFLICTS:
    If a rebase stops on conflicts:
    1. Resolve conflicts in your editor
    2. git add <resolved files>
    3. git rebase --continue
    4. gs restack"
    )]
    Restack,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    gs completion bash >> ~/.bashrc

    # Zsh
    gs completion zsh > ~/.zfunc/_gs"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
