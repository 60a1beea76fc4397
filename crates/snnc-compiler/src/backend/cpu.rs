//! Single-host CPU backend, sequential or OpenMP-parallel over neurons.

use super::{Backend, EmitContext};
use crate::code_stream::CodeStream;
use crate::config::BackendKind;
use crate::{learning, neuron, synapse, Result};

/// Plain C loops; the parallel flavour adds `omp parallel for` and atomic spike append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuBackend {
    parallel: bool,
}

impl CpuBackend {
    /// One thread
    pub fn sequential() -> Self {
        Self { parallel: false }
    }

    /// Neuron loops shared across OpenMP threads
    pub fn parallel() -> Self {
        Self { parallel: true }
    }

    /// True for the OpenMP flavour
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

/// Append used by every CPU-based backend
pub(crate) fn append_spike(
    parallel: bool,
    os: &mut CodeStream,
    count: &str,
    entry: &dyn Fn(&str) -> String,
    value: &str,
) {
    if parallel {
        os.open(90);
        os.line("unsigned int spkIdx;");
        os.line("#pragma omp atomic capture");
        os.line(format!("spkIdx = {count}++;"));
        os.line(format!("{} = {value};", entry("spkIdx")));
        os.close(90);
    } else {
        os.line(format!("{} = {value};", entry(&format!("{count}++"))));
    }
}

impl Backend for CpuBackend {
    fn kind(&self) -> BackendKind {
        if self.parallel {
            BackendKind::CpuParallel
        } else {
            BackendKind::Cpu
        }
    }

    fn emit_neuron_update(&self, cx: &EmitContext<'_>, os: &mut CodeStream) -> Result<()> {
        neuron::emit_neuron_update(cx, self, os)
    }

    fn emit_synapse_update(&self, cx: &EmitContext<'_>, os: &mut CodeStream) -> Result<()> {
        synapse::emit_synapse_update(cx, self, os)
    }

    fn emit_postsynaptic_learning(
        &self,
        cx: &EmitContext<'_>,
        os: &mut CodeStream,
    ) -> Result<()> {
        learning::emit_postsynaptic_learning(cx, self, os)
    }

    fn emit_cross_host_sync(&self, _cx: &EmitContext<'_>, _os: &mut CodeStream) -> Result<()> {
        Ok(())
    }

    fn spike_append(
        &self,
        os: &mut CodeStream,
        count: &str,
        entry: &dyn Fn(&str) -> String,
        value: &str,
    ) {
        append_spike(self.parallel, os, count, entry, value);
    }

    fn neuron_loop_pragma(&self) -> Option<&'static str> {
        self.parallel.then_some("#pragma omp parallel for")
    }

    fn runner_includes(&self) -> Vec<&'static str> {
        if self.parallel {
            vec!["<omp.h>"]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pos: &str) -> String {
        format!("ctx->PN.glbSpk[{pos}]")
    }

    #[test]
    fn sequential_append_increments_in_place() {
        let mut os = CodeStream::new();
        CpuBackend::sequential().spike_append(&mut os, "ctx->PN.glbSpkCnt[0]", &entry, "n");
        assert_eq!(os.as_str(), "ctx->PN.glbSpk[ctx->PN.glbSpkCnt[0]++] = n;\n");
    }

    #[test]
    fn parallel_append_is_atomic() {
        let mut os = CodeStream::new();
        CpuBackend::parallel().spike_append(&mut os, "ctx->PN.glbSpkCnt[0]", &entry, "n");
        let text = os.finish("t.cc").unwrap();
        assert!(text.contains("#pragma omp atomic capture\n    spkIdx = ctx->PN.glbSpkCnt[0]++;"));
        assert!(text.contains("ctx->PN.glbSpk[spkIdx] = n;"));
    }
}
