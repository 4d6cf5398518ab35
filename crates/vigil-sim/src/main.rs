//! # Vigil Sim
//!
//! Headless harness for Project Vigil.
//!
//! Loads a `vigil-sim.toml` configuration (path from the first argument),
//! spawns a seeded population from the archetype library, runs the
//! configured number of ticks and optionally writes a JSON summary.
//!
//! Set `VIGIL_LOG_JSON=1` for JSON log lines.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod scenario;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::{SimConfig, CONFIG_FILE};
use scenario::{write_summary, Scenario};

/// Main entry point.
fn main() -> Result<()> {
    let json = std::env::var_os("VIGIL_LOG_JSON").is_some();
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(EnvFilter::from_default_env().add_directive("vigil=info".parse()?))
        .init();

    info!("Vigil sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let mut config = SimConfig::load_from(&path);
    config.validate();

    info!(requested = config.population(), ticks = config.ticks, "Building scenario");
    let mut scenario = Scenario::build(config.clone())?;
    info!(
        seed = scenario.seed(),
        population = scenario.simulation().len(),
        "Scenario ready"
    );
    let summary = scenario.run();

    if let Some(summary_path) = &config.summary_path {
        write_summary(&summary, summary_path)?;
    }

    info!("Vigil sim shutdown complete");
    Ok(())
}
