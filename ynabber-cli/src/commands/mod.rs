//! CLI command implementations

pub mod run;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use ynabber_core::config::Config;
use ynabber_core::YnabberContext;

use crate::settings::Overrides;

/// Load settings, apply overrides and build the pipeline
pub fn get_context(config_path: &Path, overrides: Overrides) -> Result<YnabberContext> {
    let mut config = Config::load(config_path)?;
    overrides.apply(&mut config)?;
    config.validate()?;

    tracing::debug!(
        readers = ?config.readers,
        writers = ?config.writers,
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );

    YnabberContext::new(config).context("Failed to initialize ynabber")
}
