//! cli
//!
//! Command-line interface layer for gstack.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Merge flags with global configuration
//! - Install logging and the interrupt handler
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::{Context as _, Result};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::core::cancel::Cancellation;
use crate::core::config::Config;
use crate::engine;

/// Environment variable holding a `tracing` filter, e.g. `gstack=trace`.
pub const LOG_ENV: &str = "GSTACK_LOG";

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let config = Config::load(None).context("failed to load configuration")?;

    // Flags can only turn settings on; config supplies the defaults.
    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug || config.debug(),
        quiet: cli.quiet || config.quiet(),
        cancel: Cancellation::new(),
    };

    init_tracing(ctx.debug);
    if let Some(path) = config.global_config_loaded_from() {
        debug!(path = %path.display(), "loaded global config");
    }
    install_interrupt_handler(&ctx.cancel);

    commands::dispatch(cli.command, &ctx)
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

fn install_interrupt_handler(cancel: &Cancellation) {
    let cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        warn!(error = %e, "could not install interrupt handler");
    }
}
