pub mod task;
pub mod worker;

use anyhow::{Context, Result};
use odg_worker::config::loader::load_config;
use odg_worker::observability::init_tracing;
use odg_worker::WorkerConfig;

use crate::cli::ConfigArgs;

/// Loads the configuration and applies its logging settings.
pub(crate) fn load(args: &ConfigArgs) -> Result<WorkerConfig> {
    let config = load_config(args.config.as_slice()).context("failed to load configuration")?;
    init_tracing(config.log_level(), config.logging.format);
    tracing::info!(files = ?args.config, jobs = config.jobs.len(), "configuration loaded");
    Ok(config)
}
