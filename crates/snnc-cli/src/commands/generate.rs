//! Code generation command

use std::path::PathBuf;

use clap::Args;
use snnc_compiler::{compile_model, write_output, BackendKind, GeneratorConfig};
use tracing::{info, warn};

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::model_file::ModelFile;

/// Generate simulation sources
#[derive(Args, Debug)]
pub struct GenerateCommand {
    /// Model file (TOML)
    pub model: PathBuf,

    /// Output directory (defaults to `<model name>_CODE`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Backend to emit for: cpu, cpu_parallel or mpi
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    /// Alignment of padded neuron offsets
    #[arg(long)]
    pub block_size: Option<u32>,

    /// Do not emit sparse connectivity loaders
    #[arg(long)]
    pub no_sparse_loaders: bool,

    /// Fail when generation reports warnings
    #[arg(long)]
    pub deny_warnings: bool,
}

pub(crate) fn parse_backend(s: &str) -> Result<BackendKind, String> {
    s.parse().map_err(|e: snnc_compiler::CompilerError| e.to_string())
}

impl GenerateCommand {
    /// Generator settings after applying command-line overrides
    pub fn generator_config(&self, config: &CliConfig) -> GeneratorConfig {
        let mut generator = config.generator.clone();
        if let Some(backend) = self.backend {
            generator.backend = backend;
        }
        if let Some(block_size) = self.block_size {
            generator.block_size = block_size;
        }
        if self.no_sparse_loaders {
            generator.sparse_loaders = false;
        }
        generator
    }

    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        let file = ModelFile::load(&self.model)?;
        let generator = self.generator_config(config);
        info!(
            "Generating '{}' for the {} backend",
            file.name, generator.backend
        );

        let code = compile_model(file.to_model()?, &generator)?;
        for w in &code.warnings {
            warn!("{}", w);
        }
        if self.deny_warnings && !code.warnings.is_empty() {
            return Err(crate::error::CliError::invalid_args(format!(
                "{} warnings with --deny-warnings",
                code.warnings.len()
            )));
        }

        let dir = match self.output {
            Some(dir) => dir,
            None => {
                let leaf = format!("{}_CODE", file.name);
                match &config.output_root {
                    Some(root) => root.join(leaf),
                    None => PathBuf::from(leaf),
                }
            }
        };
        let written = write_output(&code, &dir)?;
        for path in &written {
            println!("{}", path.display());
        }
        info!("Wrote {} files to {}", written.len(), dir.display());
        Ok(())
    }
}
