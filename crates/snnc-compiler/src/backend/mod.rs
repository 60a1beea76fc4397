//! Backend capability interface.
//!
//! A backend decides how the shared neuron, synapse and learning generators
//! are wrapped: which loops run in parallel, how a spike is appended to a
//! population's list, which groups a host executes, and which extra files
//! the target needs. Backends are picked at run time from [`BackendKind`].

use snnc_model::{ExchangePlan, ModelSpec, Precision};

use crate::code_stream::CodeStream;
use crate::config::{BackendKind, GeneratorConfig};
use crate::substitution::literal;
use crate::Result;

mod cpu;
mod mpi;

pub use cpu::CpuBackend;
pub use mpi::MpiBackend;

/// Everything an emitter reads: the frozen model, the settings and the exchange plan
#[derive(Debug)]
pub struct EmitContext<'a> {
    /// Finalized model
    pub model: &'a ModelSpec,
    /// Generator settings
    pub config: &'a GeneratorConfig,
    /// Cross-host transfers; empty unless the backend is MPI
    pub exchange: ExchangePlan,
}

impl<'a> EmitContext<'a> {
    /// Build the context, deriving the exchange plan for the MPI backend
    pub fn new(model: &'a ModelSpec, config: &'a GeneratorConfig) -> Self {
        let exchange = if config.backend == BackendKind::Mpi {
            ExchangePlan::build(model)
        } else {
            ExchangePlan::default()
        };
        Self {
            model,
            config,
            exchange,
        }
    }

    /// Model precision
    pub fn precision(&self) -> Precision {
        self.model.precision()
    }

    /// A value as a literal of the model precision
    pub fn literal(&self, value: f64) -> String {
        literal(value, self.model.precision())
    }
}

/// Emission hooks a target provides
pub trait Backend {
    /// Which configuration value selects this backend
    fn kind(&self) -> BackendKind;

    /// Write `calcNeuronsCPU`
    fn emit_neuron_update(&self, cx: &EmitContext<'_>, os: &mut CodeStream) -> Result<()>;

    /// Write `calcSynapsesCPU`
    fn emit_synapse_update(&self, cx: &EmitContext<'_>, os: &mut CodeStream) -> Result<()>;

    /// Write `learnSynapsesPost`
    fn emit_postsynaptic_learning(&self, cx: &EmitContext<'_>, os: &mut CodeStream)
        -> Result<()>;

    /// Write the step-function call that moves spikes between hosts, if any
    fn emit_cross_host_sync(&self, cx: &EmitContext<'_>, os: &mut CodeStream) -> Result<()>;

    /// Append `value` to a spike list. `count` is the count lvalue; `entry` maps a
    /// list position expression to the list element lvalue.
    fn spike_append(
        &self,
        os: &mut CodeStream,
        count: &str,
        entry: &dyn Fn(&str) -> String,
        value: &str,
    );

    /// Pragma placed before each population's neuron loop
    fn neuron_loop_pragma(&self) -> Option<&'static str> {
        None
    }

    /// Condition restricting a group's update to the host that owns it
    fn host_guard(&self, _host: u32) -> Option<String> {
        None
    }

    /// Headers `runner.cc` includes beyond the standard ones
    fn runner_includes(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Additional `(file name, contents)` pairs
    fn extra_files(&self, _cx: &EmitContext<'_>) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

/// Backend for a configuration value
pub fn for_kind(kind: BackendKind) -> Box<dyn Backend> {
    match kind {
        BackendKind::Cpu => Box::new(CpuBackend::sequential()),
        BackendKind::CpuParallel => Box::new(CpuBackend::parallel()),
        BackendKind::Mpi => Box::new(MpiBackend::new()),
    }
}

/// Open a block for a group: under the host guard when there is one
pub(crate) fn open_group_block(
    backend: &dyn Backend,
    host: u32,
    os: &mut CodeStream,
    id: u32,
) {
    match backend.host_guard(host) {
        Some(guard) => os.open_with(guard, id),
        None => os.open(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_factory() {
        for kind in BackendKind::ALL {
            assert_eq!(for_kind(kind).kind(), kind);
        }
    }

    #[test]
    fn only_mpi_guards_hosts() {
        assert_eq!(for_kind(BackendKind::Cpu).host_guard(1), None);
        assert_eq!(
            for_kind(BackendKind::Mpi).host_guard(1).as_deref(),
            Some("if (ctx->hostID == 1)")
        );
    }
}
