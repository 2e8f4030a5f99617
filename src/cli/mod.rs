//! Command-line entry: configuration, logging, adapters, then the sweep.

pub mod output;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::domain::errors::SweepError;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::infrastructure::{DockerCli, RedisStore};
use crate::services::{SweepController, SweepSummary};

pub use types::Cli;

/// Exit status for an interrupted sweep (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Run a full sweep as described by `cli`.
pub async fn execute(cli: Cli) -> Result<SweepSummary> {
    let config = ConfigLoader::load(cli.config.as_deref())?;
    let _logger = LoggerImpl::init(&LogConfig::try_from(&config.logging)?)?;

    if !cli.header.is_file() {
        anyhow::bail!(
            "Build configuration header {} does not exist",
            cli.header.display()
        );
    }

    let source_dir = match config.build.source_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    let runtime = Arc::new(DockerCli::new(config.runtime.docker_path.clone()));
    let store = Arc::new(RedisStore::new(&config.store.url)?);

    info!(
        header = %cli.header.display(),
        source_dir = %source_dir.display(),
        "swimbench starting"
    );

    let controller = SweepController::new(runtime, store, config, cli.header, source_dir)?;
    let summary = controller.run().await?;

    println!("{}", output::render_summary(&summary));
    Ok(summary)
}

/// Print `err` and map it to a process exit code.
pub fn handle_error(err: &anyhow::Error) -> i32 {
    eprintln!("Error: {err:#}");
    exit_code(err)
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SweepError>() {
        Some(SweepError::Interrupted) => EXIT_INTERRUPTED,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_maps_to_130() {
        let err = anyhow::Error::new(SweepError::Interrupted);
        assert_eq!(exit_code(&err), 130);
    }

    #[test]
    fn other_errors_map_to_1() {
        let err = anyhow::anyhow!("config file missing");
        assert_eq!(exit_code(&err), 1);

        let flush = anyhow::Error::new(SweepError::Flush(
            crate::domain::errors::StoreError::Connection("refused".to_string()),
        ));
        assert_eq!(exit_code(&flush), 1);
    }
}
