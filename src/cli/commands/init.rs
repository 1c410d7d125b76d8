//! init command - Initialize stack tracking in this repository

use anyhow::{bail, Context as _, Result};
use tracing::debug;

use super::open_repo;
use crate::core::config::Config;
use crate::core::paths::StackPaths;
use crate::core::state::GitStateStore;
use crate::core::types::BranchName;
use crate::engine::Context;
use crate::git::VersionControl;
use crate::ui::output::{self, Verbosity};

/// Initialize stack tracking.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `trunk` - Trunk branch; falls back to repo config, then the current branch
/// * `force` - Re-initialize, re-rooting existing state at `trunk`
pub fn init(ctx: &Context, trunk: Option<&str>, force: bool) -> Result<()> {
    let git = open_repo(ctx)?;
    let paths = StackPaths::from_repo_info(&git.info()?);
    let config = Config::load(Some(&paths)).context("failed to load repository config")?;
    if let Some(path) = config.repo_config_loaded_from() {
        debug!(path = %path.display(), "loaded repository config");
    }

    let trunk = match trunk.or_else(|| config.trunk()) {
        Some(name) => BranchName::new(name).context("invalid trunk branch name")?,
        None => git
            .current_branch()?
            .context("HEAD is detached; pass --trunk to choose a trunk")?,
    };

    if !git.ref_exists(&trunk.ref_name()) {
        bail!("trunk branch '{}' does not exist", trunk);
    }

    GitStateStore::init(&git, &trunk, force)?;

    output::success(
        format!("Initialized with trunk '{}'", trunk),
        Verbosity::from_context(ctx),
    );
    Ok(())
}
