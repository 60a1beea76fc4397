//! Generator configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CompilerError;

/// Target the generated simulation runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Single-threaded CPU loops
    #[default]
    Cpu,
    /// CPU with OpenMP-parallel neuron updates and atomic spike append
    CpuParallel,
    /// CPU update code plus blocking MPI spike exchange between hosts
    Mpi,
}

impl BackendKind {
    /// All kinds, for help text
    pub const ALL: [BackendKind; 3] = [BackendKind::Cpu, BackendKind::CpuParallel, BackendKind::Mpi];

    /// Configuration spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cpu => "cpu",
            BackendKind::CpuParallel => "cpu_parallel",
            BackendKind::Mpi => "mpi",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(BackendKind::Cpu),
            "cpu_parallel" | "cpu-parallel" | "openmp" => Ok(BackendKind::CpuParallel),
            "mpi" => Ok(BackendKind::Mpi),
            other => Err(CompilerError::Message(format!(
                "unknown backend '{other}' (expected one of: cpu, cpu_parallel, mpi)"
            ))),
        }
    }
}

/// Settings that shape generated code but not model semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Backend to emit for
    pub backend: BackendKind,
    /// Alignment used for padded neuron offsets
    pub block_size: u32,
    /// Emit `load<Synapse>` helpers reading persisted sparse connectivity
    pub sparse_loaders: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Cpu,
            block_size: 32,
            sparse_loaders: true,
        }
    }
}

impl GeneratorConfig {
    /// Default settings for a backend
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Set the block size
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backend_names() {
        assert_eq!("mpi".parse::<BackendKind>().unwrap(), BackendKind::Mpi);
        assert_eq!("openmp".parse::<BackendKind>().unwrap(), BackendKind::CpuParallel);
        assert!("cuda".parse::<BackendKind>().is_err());
        for k in BackendKind::ALL {
            assert_eq!(k.as_str().parse::<BackendKind>().unwrap(), k);
        }
    }

    #[test]
    fn defaults() {
        let c = GeneratorConfig::default();
        assert_eq!(c.backend, BackendKind::Cpu);
        assert_eq!(c.block_size, 32);
        assert!(c.sparse_loaders);
    }
}
