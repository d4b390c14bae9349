use anyhow::{Context, Result};
use tracing::debug;

use jobsys_scheduler::SchedulerConfig;

use crate::cli::CliArgs;

/// Resolve the scheduler config: file (or env defaults), then CLI overrides.
pub fn resolve(args: &CliArgs) -> Result<SchedulerConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("failed to load scheduler config from {path}"))?,
        None => SchedulerConfig::from_env().context("invalid JOBSYS_* environment")?,
    };

    if let Some(workers) = args.workers {
        config.worker_threads = workers;
    }
    if let Some(levels) = args.levels {
        config.priority_levels = levels;
    }
    config.validate().context("invalid scheduler config")?;

    debug!(?config, "scheduler config resolved");
    Ok(config)
}
