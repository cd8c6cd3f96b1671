//! Engine binary for the Apocalypse simulation.
//!
//! Loads the configuration, runs the simulation in the configured
//! concurrency mode and reports how long it took. Stats blocks go to
//! stdout (or per-tile files in distributed mode); logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `APOCALYPSE_CONFIG` or
//!    `apocalypse-config.yaml`, falling back to defaults
//! 2. Initialize structured logging (tracing)
//! 3. Validate the configuration
//! 4. Run the simulation on a blocking thread
//! 5. Print the timing line
//! 6. Write the run summary

mod error;

use std::path::Path;

use anyhow::Context as _;
use apocalypse_core::config::{self, LoggingConfig, SimulationConfig};
use apocalypse_core::simulation;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the run fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let path = config::config_path();
    let (config, from_file) = load_config(&path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("apocalypse-engine starting");
    if from_file {
        info!(path = %path.display(), "Configuration loaded");
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
    }

    // 3. Validate.
    config.validate().map_err(EngineError::from)?;
    info!(
        mode = ?config.concurrency.mode,
        width = config.world.width,
        height = config.world.height,
        ticks = config.world.ticks,
        seed = config.world.seed,
        "Configuration validated"
    );

    // 4. Run the simulation.
    let run_config = config.clone();
    let summary = tokio::task::spawn_blocking(move || simulation::run(&run_config))
        .await
        .map_err(EngineError::from)?
        .map_err(EngineError::from)?;

    // 5. Timing.
    println!(
        "Took {:.6} milliseconds with {} threads",
        summary.elapsed_ms, summary.threads
    );

    // 6. Run summary.
    if config.output.summary {
        let written = summary
            .write_to(&config.output.directory)
            .with_context(|| {
                format!(
                    "failed to write the run summary into {}",
                    config.output.directory.display()
                )
            })?;
        info!(path = %written.display(), run_id = %summary.run_id, "Run summary written");
    }

    info!(
        ticks = summary.final_tick,
        humans = summary.final_stats.humans(),
        infected = summary.final_stats.infected(),
        zombies = summary.final_stats.zombies,
        "apocalypse-engine shutdown complete"
    );
    Ok(())
}

/// Load the configuration from `path`, or defaults if there is no such
/// file. Also reports whether the file was found.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        let config = SimulationConfig::from_file(path)?;
        Ok((config, true))
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides()?;
        Ok((config, false))
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_means_defaults() {
        let (config, from_file) = load_config(Path::new("does-not-exist.yaml")).unwrap();
        assert!(!from_file);
        assert_eq!(config.world.width, SimulationConfig::default().world.width);
    }

    #[test]
    fn broken_config_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("apocalypse-engine-{}.yaml", std::process::id()));
        std::fs::write(&path, "world: [not, a, map").unwrap();
        let result = load_config(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }
}
