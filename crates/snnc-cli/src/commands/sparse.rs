//! Sparse connectivity file commands
//!
//! Files hold the weights, then `indInG`, then `ind`, little-endian and
//! unframed, exactly as the generated `load<Synapse>` helpers read them.
//!
//! Example:
//!   snnc sparse pack --edges pnkc.txt --sources 100 --targets 1000 -o PNKC.bin
//!   snnc sparse check PNKC.bin --sources 100 --targets 1000

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use snnc_model::{Connectivity, Precision};
use snnc_storage::{load_sparse_file, save_sparse_file, SparseProjection, WeightValues};
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::model_file::ModelFile;

#[derive(Args, Debug)]
pub struct SparseCommand {
    #[command(subcommand)]
    pub sub: SparseSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SparseSubcommand {
    /// Validate a connectivity file and print its statistics
    Check(SparseCheck),
    /// Build a connectivity file from a text edge list
    Pack(SparsePack),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrecisionArg {
    Float,
    Double,
}

impl From<PrecisionArg> for Precision {
    fn from(p: PrecisionArg) -> Self {
        match p {
            PrecisionArg::Float => Precision::Float,
            PrecisionArg::Double => Precision::Double,
        }
    }
}

/// Where population sizes and precision come from
#[derive(Args, Debug)]
pub struct ProjectionShape {
    /// Source population size
    #[arg(long, required_unless_present = "model")]
    pub sources: Option<u32>,

    /// Target population size
    #[arg(long, required_unless_present = "model")]
    pub targets: Option<u32>,

    /// Weight precision
    #[arg(long, value_enum)]
    pub precision: Option<PrecisionArg>,

    /// Take sizes and precision from this model file
    #[arg(long, requires = "synapse")]
    pub model: Option<PathBuf>,

    /// Sparse synapse group of `--model`
    #[arg(long)]
    pub synapse: Option<String>,
}

impl ProjectionShape {
    /// `(precision, sources, targets)`
    pub fn resolve(&self) -> CliResult<(Precision, u32, u32)> {
        let Some(path) = &self.model else {
            let (Some(sources), Some(targets)) = (self.sources, self.targets) else {
                return Err(CliError::invalid_args("--sources and --targets are required"));
            };
            let precision = self.precision.map(Precision::from).unwrap_or_default();
            return Ok((precision, sources, targets));
        };
        let name = self
            .synapse
            .as_deref()
            .ok_or_else(|| CliError::invalid_args("--model needs --synapse"))?;
        let model = ModelFile::load(path)?.to_model()?;
        let sg = model
            .find_synapse_group(name)
            .map(|id| model.synapse_group(id))
            .ok_or_else(|| CliError::invalid_args(format!("model has no synapse group '{name}'")))?;
        if sg.connectivity() != Connectivity::Sparse {
            return Err(CliError::invalid_args(format!(
                "synapse group '{name}' is {}, not sparse",
                sg.connectivity().as_str()
            )));
        }
        let precision = self.precision.map(Precision::from).unwrap_or(model.precision());
        Ok((
            precision,
            model.neuron_group(sg.src()).num_neurons(),
            model.neuron_group(sg.trg()).num_neurons(),
        ))
    }
}

#[derive(Args, Debug)]
pub struct SparseCheck {
    /// Connectivity file
    pub file: PathBuf,

    #[command(flatten)]
    pub shape: ProjectionShape,

    /// Print the statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SparsePack {
    /// Edge list: one `pre post weight` triple per line, `#` starts a comment
    #[arg(long)]
    pub edges: PathBuf,

    #[command(flatten)]
    pub shape: ProjectionShape,

    /// Output connectivity file
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Statistics printed by `check`
#[derive(Debug, Serialize, PartialEq)]
pub struct SparseStats {
    pub conn_n: usize,
    pub sources: u32,
    pub targets: u32,
    pub max_out_degree: u32,
    pub empty_rows: u32,
    pub weight_min: Option<f64>,
    pub weight_max: Option<f64>,
}

impl SparseStats {
    pub fn of(weights: &WeightValues, proj: &SparseProjection) -> Self {
        let w = weights.to_f64();
        Self {
            conn_n: proj.conn_n(),
            sources: proj.source_count(),
            targets: proj.target_count(),
            max_out_degree: proj.max_out_degree(),
            empty_rows: (0..proj.source_count())
                .filter(|&pre| proj.out_degree(pre) == 0)
                .count() as u32,
            weight_min: w.iter().copied().reduce(f64::min),
            weight_max: w.iter().copied().reduce(f64::max),
        }
    }
}

/// Parse an edge list into `(pre, post)` pairs and weights, in file order
pub fn parse_edges(text: &str, origin: &Path) -> CliResult<(Vec<(u32, u32)>, Vec<f64>)> {
    let mut edges = Vec::new();
    let mut weights = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let bad = |what: &str| {
            CliError::invalid_args(format!(
                "{}:{}: {what} in '{line}'",
                origin.display(),
                lineno + 1
            ))
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        let &[pre, post, weight] = fields.as_slice() else {
            return Err(bad("expected `pre post weight`"));
        };
        edges.push((
            pre.parse().map_err(|_| bad("bad source index"))?,
            post.parse().map_err(|_| bad("bad target index"))?,
        ));
        weights.push(weight.parse().map_err(|_| bad("bad weight"))?);
    }
    Ok((edges, weights))
}

impl SparseCommand {
    pub fn execute(self) -> CliResult<()> {
        match self.sub {
            SparseSubcommand::Check(cmd) => cmd.execute(),
            SparseSubcommand::Pack(cmd) => cmd.execute(),
        }
    }
}

impl SparseCheck {
    pub fn execute(self) -> CliResult<()> {
        let (precision, sources, targets) = self.shape.resolve()?;
        let (weights, proj) = load_sparse_file(&self.file, precision, sources, targets)?;
        proj.validate()?;
        let stats = SparseStats::of(&weights, &proj);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("{}: ok", self.file.display());
            println!("  connections:    {}", stats.conn_n);
            println!("  sources:        {} ({} without connections)", stats.sources, stats.empty_rows);
            println!("  targets:        {}", stats.targets);
            println!("  max out-degree: {}", stats.max_out_degree);
            if let (Some(lo), Some(hi)) = (stats.weight_min, stats.weight_max) {
                println!("  weights:        [{lo}, {hi}]");
            }
        }
        Ok(())
    }
}

impl SparsePack {
    pub fn execute(self) -> CliResult<()> {
        let (precision, sources, targets) = self.shape.resolve()?;
        let text = std::fs::read_to_string(&self.edges)?;
        let (mut edges, weights) = parse_edges(&text, &self.edges)?;

        // rows are filled in edge order, so weights follow a stable sort by source
        let mut order: Vec<usize> = (0..edges.len()).collect();
        order.sort_by_key(|&i| edges[i].0);
        let weights: Vec<f64> = order.iter().map(|&i| weights[i]).collect();
        edges = order.iter().map(|&i| edges[i]).collect();

        let proj = SparseProjection::from_edges(sources, targets, &edges)?;
        save_sparse_file(&self.output, &WeightValues::from_f64(precision, &weights), &proj)?;
        info!(
            "Packed {} connections ({} -> {}) into {}",
            proj.conn_n(),
            sources,
            targets,
            self.output.display()
        );
        println!("{}", self.output.display());
        Ok(())
    }
}
