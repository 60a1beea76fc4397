//! # snnc - spiking network model compiler
//!
//! Generates C simulation sources from population-level model files.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use snnc_cli::{CliConfig, SnncCli};

fn main() -> anyhow::Result<()> {
    let cli = SnncCli::parse();
    let config = CliConfig::resolve(cli.config.as_deref());

    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .ok()
            .and_then(|c| c.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = config
        .map_err(anyhow::Error::from)
        .and_then(|config| cli.execute(&config).map_err(anyhow::Error::from));
    if let Err(err) = result {
        error!("Command failed: {:#}", err);
        std::process::exit(1);
    }

    Ok(())
}
