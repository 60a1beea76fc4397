//! CLI command implementations for snnc

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::CliConfig;
use crate::error::CliResult;

pub mod generate;
pub mod inspect;
pub mod sparse;

/// snnc - code generator for spiking neural network models
#[derive(Parser, Debug)]
#[command(
    name = "snnc",
    version,
    about = "Code generator for spiking neural network models",
    long_about = "snnc turns a population-level model description into C simulation \
                  sources: neuron and synapse kernels, delay rings, sparse connectivity \
                  loaders and, for clusters, blocking spike exchange between hosts."
)]
pub struct SnncCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (defaults to ./snnc.toml, then the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate simulation sources for a model file
    #[command(alias = "gen")]
    Generate(generate::GenerateCommand),

    /// Summarize a model after planning
    Inspect(inspect::InspectCommand),

    /// Persisted sparse connectivity files
    Sparse(sparse::SparseCommand),
}

impl SnncCli {
    /// Execute the CLI command with an already resolved configuration
    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        match self.command {
            Commands::Generate(cmd) => cmd.execute(config),
            Commands::Inspect(cmd) => cmd.execute(config),
            Commands::Sparse(cmd) => cmd.execute(),
        }
    }
}
