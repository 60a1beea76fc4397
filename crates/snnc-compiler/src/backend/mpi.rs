//! Multi-host backend: CPU update code plus blocking MPI spike exchange.
//!
//! All hosts run the same binary. Group updates are wrapped in
//! `if (ctx->hostID == h)`; ring pointers advance on every host so slot
//! arithmetic agrees everywhere. `communicateSpikes` walks the exchange plan
//! in order and each host performs only its own side of each transfer. A
//! transfer ships whole buffers, so a delayed population arrives with its full
//! ring and the receiver's slot arithmetic sees the sender's history.

use snnc_model::{NeuronGroup, SpikeKind};

use super::cpu::append_spike;
use super::{Backend, EmitContext};
use crate::code_stream::CodeStream;
use crate::config::BackendKind;
use crate::naming::{count_field, field, list_field, spike_count_len, spike_list_len};
use crate::{learning, neuron, synapse, Result};

/// Header declaring the exchange functions
pub const HEADER: &str = "infraMPI.h";
/// Exchange implementation
pub const SOURCE: &str = "infraMPI.cc";

/// MPI cluster target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpiBackend;

impl MpiBackend {
    /// New backend
    pub fn new() -> Self {
        Self
    }
}

fn push_name(ng: &NeuronGroup) -> String {
    format!("push{}SpikesToRemote", ng.name())
}

fn pull_name(ng: &NeuronGroup) -> String {
    format!("pull{}SpikesFromRemote", ng.name())
}

fn emit_header(cx: &EmitContext<'_>) -> Result<String> {
    let mut os = CodeStream::new();
    os.line("#ifndef INFRAMPI_H");
    os.line("#define INFRAMPI_H");
    os.blank();
    os.line("#include \"definitions.h\"");
    os.blank();
    os.line("int initMPI(SimContext *ctx, int *argc, char ***argv);");
    os.line("void finalizeMPI(void);");
    for id in cx.exchange.exchanged().into_keys() {
        let ng = cx.model.neuron_group(id);
        os.line(format!("void {}(SimContext *ctx, int remote, int tag);", push_name(ng)));
        os.line(format!("void {}(SimContext *ctx, int remote, int tag);", pull_name(ng)));
    }
    os.line("void communicateSpikes(SimContext *ctx);");
    os.blank();
    os.line("#endif");
    os.finish(HEADER)
}

/// Whole count and index buffers of each carried list, every ring slot included
fn buffers(ng: &NeuronGroup, kinds: &[SpikeKind]) -> Vec<(String, u64)> {
    kinds
        .iter()
        .flat_map(|&kind| {
            [
                (field(ng.name(), count_field(kind)), u64::from(spike_count_len(ng))),
                (field(ng.name(), list_field(kind)), spike_list_len(ng)),
            ]
        })
        .collect()
}

fn emit_transfer_fns(ng: &NeuronGroup, kinds: &[SpikeKind], os: &mut CodeStream) {
    let buffers = buffers(ng, kinds);

    os.open_with(
        format!("void {}(SimContext *ctx, int remote, int tag)", push_name(ng)),
        100,
    );
    for (buf, len) in &buffers {
        os.line(format!("MPI_Send({buf}, {len}, MPI_UNSIGNED, remote, tag, MPI_COMM_WORLD);"));
    }
    os.close(100);
    os.blank();

    os.open_with(
        format!("void {}(SimContext *ctx, int remote, int tag)", pull_name(ng)),
        101,
    );
    for (buf, len) in &buffers {
        os.line(format!(
            "MPI_Recv({buf}, {len}, MPI_UNSIGNED, remote, tag, MPI_COMM_WORLD, MPI_STATUS_IGNORE);"
        ));
    }
    os.close(101);
    os.blank();
}

fn emit_source(cx: &EmitContext<'_>) -> Result<String> {
    let mut os = CodeStream::new();
    os.comment(format!("spike exchange for model {}", cx.model.name()));
    os.line("#include <mpi.h>");
    os.line("#include \"definitions.h\"");
    os.line(format!("#include \"{HEADER}\""));
    os.blank();

    os.open_with("int initMPI(SimContext *ctx, int *argc, char ***argv)", 1);
    os.line("int rank = 0;");
    os.line("MPI_Init(argc, argv);");
    os.line("MPI_Comm_rank(MPI_COMM_WORLD, &rank);");
    os.line("ctx->hostID = rank;");
    os.line("return rank;");
    os.close(1);
    os.blank();
    os.open_with("void finalizeMPI(void)", 2);
    os.line("MPI_Finalize();");
    os.close(2);
    os.blank();

    for (id, kinds) in cx.exchange.exchanged() {
        emit_transfer_fns(cx.model.neuron_group(id), kinds, &mut os);
    }

    os.open_with("void communicateSpikes(SimContext *ctx)", 3);
    for t in cx.exchange.transfers() {
        let ng = cx.model.neuron_group(t.population);
        os.comment(format!(
            "{} host {} -> host {} (tag {})",
            ng.name(),
            t.sender,
            t.receiver,
            t.tag
        ));
        os.open_with(format!("if (ctx->hostID == {})", t.sender), 4);
        os.line(format!("{}(ctx, {}, {});", push_name(ng), t.receiver, t.tag));
        os.close(4);
        os.open_with(format!("else if (ctx->hostID == {})", t.receiver), 5);
        os.line(format!("{}(ctx, {}, {});", pull_name(ng), t.sender, t.tag));
        os.close(5);
    }
    os.close(3);
    os.finish(SOURCE)
}

impl Backend for MpiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mpi
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

    fn emit_cross_host_sync(&self, _cx: &EmitContext<'_>, os: &mut CodeStream) -> Result<()> {
        os.line("communicateSpikes(ctx);");
        Ok(())
    }

    fn spike_append(
        &self,
        os: &mut CodeStream,
        count: &str,
        entry: &dyn Fn(&str) -> String,
        value: &str,
    ) {
        append_spike(false, os, count, entry, value);
    }

    fn host_guard(&self, host: u32) -> Option<String> {
        Some(format!("if (ctx->hostID == {host})"))
    }

    fn runner_includes(&self) -> Vec<&'static str> {
        vec!["\"infraMPI.h\""]
    }

    fn extra_files(&self, cx: &EmitContext<'_>) -> Result<Vec<(String, String)>> {
        Ok(vec![
            (HEADER.to_string(), emit_header(cx)?),
            (SOURCE.to_string(), emit_source(cx)?),
        ])
    }
}
