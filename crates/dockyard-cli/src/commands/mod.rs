//! CLI command implementations.

pub mod config;
pub mod run;
pub mod tasks;

use anyhow::{Context, Result};

use dockyard_config::Settings;

use crate::GlobalArgs;

/// Build the settings table once for this invocation.
pub fn load_settings(global: &GlobalArgs) -> Result<Settings> {
    Settings::load(global.config.as_deref(), &global.overrides).context("failed to load settings")
}
