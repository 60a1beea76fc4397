//! Shared header (`definitions.h`): precision, step, state structs, prototypes.
//!
//! Every population and synapse group owns one state struct; `SimContext`
//! aggregates them in declaration order so generated code reaches all state
//! through a single pointer.

use snnc_model::{Connectivity, NeuronGroup, SynapseGroup};

use crate::backend::{Backend, EmitContext};
use crate::code_stream::CodeStream;
use crate::connectivity::{addresses_synapse, BIT_MACRO};
use crate::learning::{self, needs_reverse_index};
use crate::naming::state_type;
use crate::{neuron, Result};

/// Generated file name
pub const FILE: &str = "definitions.h";

/// Linear congruential step used by stochastic models
pub const RAND_MACRO: &str = "#define MYRAND(Y,X) Y = Y * 1103515245 + 12345; X = (Y >> 16);";

fn state_field(os: &mut CodeStream, ty: &str, name: &str, zero_copy: bool) {
    let decl = format!("{};", neuron::c_param(ty, name));
    if zero_copy {
        os.line(format!("{decl} /* zero-copy */"));
    } else {
        os.line(decl);
    }
}

fn emit_neuron_state(ng: &NeuronGroup, os: &mut CodeStream) {
    os.line("typedef struct");
    os.open(1);
    state_field(os, "unsigned int *", "glbSpkCnt", ng.is_spike_zero_copy());
    state_field(os, "unsigned int *", "glbSpk", ng.is_spike_zero_copy());
    if ng.needs_spike_events() {
        state_field(os, "unsigned int *", "glbSpkCntEvnt", ng.is_spike_event_zero_copy());
        state_field(os, "unsigned int *", "glbSpkEvnt", ng.is_spike_event_zero_copy());
    }
    if ng.needs_spike_time() {
        state_field(os, "scalar *", "sT", ng.is_spike_time_zero_copy());
    }
    if ng.delay_ring().is_delayed() {
        os.line("unsigned int spkQuePtr;");
    }
    for v in &ng.model().vars {
        state_field(os, &format!("{} *", v.ty), &v.name, ng.is_var_zero_copy(&v.name));
    }
    os.close(1);
    os.line(format!("{};", state_type(ng.name())));
    os.blank();
}

fn emit_synapse_state(sg: &SynapseGroup, os: &mut CodeStream) {
    os.line("typedef struct");
    os.open(2);
    os.line("scalar *inSyn;");
    for v in &sg.ps_model().vars {
        state_field(os, &format!("{} *", v.ty), &v.name, false);
    }
    match sg.connectivity() {
        Connectivity::Dense => {}
        Connectivity::Sparse => {
            os.line("unsigned int connN;");
            os.line("unsigned int *indInG;");
            os.line("unsigned int *ind;");
            if needs_reverse_index(sg) {
                os.line("unsigned int *revIndInG;");
                os.line("unsigned int *revInd;");
                os.line("unsigned int *remap;");
            }
        }
        Connectivity::Bitmask => os.line("uint32_t *gp;"),
    }
    if addresses_synapse(sg) {
        os.line("scalar *g;");
    }
    if sg.is_learning() {
        os.line("scalar *gRaw;");
    }
    os.close(2);
    os.line(format!("{};", state_type(sg.name())));
    os.blank();
}

/// Prototypes of the per-group sparse helpers defined in `runner.cc`
pub fn sparse_prototypes(cx: &EmitContext<'_>) -> Vec<String> {
    let mut protos = Vec::new();
    for (_, sg) in cx.model.synapse_groups() {
        if sg.connectivity() != Connectivity::Sparse {
            continue;
        }
        protos.push(format!(
            "void allocate{}(SimContext *ctx, unsigned int connN);",
            sg.name()
        ));
        if cx.config.sparse_loaders {
            protos.push(format!(
                "int load{}(SimContext *ctx, const char *path);",
                sg.name()
            ));
        }
    }
    protos
}

/// Write the whole `definitions.h`
pub fn emit(cx: &EmitContext<'_>, backend: &dyn Backend) -> Result<String> {
    let model = cx.model;
    let mut os = CodeStream::new();
    os.comment(format!(
        "definitions of model {} ({} backend)",
        model.name(),
        backend.kind()
    ));
    os.line("#ifndef DEFINITIONS_H");
    os.line("#define DEFINITIONS_H");
    os.blank();
    os.line("#include <stdint.h>");
    os.line("#include <stdlib.h>");
    os.line("#include <stdio.h>");
    os.line("#include <string.h>");
    os.line("#include <math.h>");
    os.blank();
    os.line(format!("typedef {} scalar;", model.precision().c_type()));
    os.line(format!("#define DT {}", cx.literal(model.dt())));
    os.line(BIT_MACRO);
    os.line(RAND_MACRO);
    os.blank();

    for (_, ng) in model.neuron_groups() {
        emit_neuron_state(ng, &mut os);
    }
    for (_, sg) in model.synapse_groups() {
        emit_synapse_state(sg, &mut os);
    }

    os.line("typedef struct");
    os.open(3);
    os.line("int hostID;");
    for (_, ng) in model.neuron_groups() {
        os.line(format!("{} {};", state_type(ng.name()), ng.name()));
    }
    for (_, sg) in model.synapse_groups() {
        os.line(format!("{} {};", state_type(sg.name()), sg.name()));
    }
    os.close(3);
    os.line("SimContext;");
    os.blank();

    os.line("void allocateMem(SimContext *ctx);");
    os.line("void freeMem(SimContext *ctx);");
    os.line("void initialize(SimContext *ctx);");
    for proto in sparse_prototypes(cx) {
        os.line(proto);
    }
    if model
        .synapse_groups()
        .any(|(_, sg)| needs_reverse_index(sg))
    {
        os.line("void initializeSparse(SimContext *ctx);");
    }
    os.line(format!("{};", neuron::signature(model, neuron::STEP_FN)));
    os.line("void calcSynapsesCPU(SimContext *ctx, scalar t);");
    if model.any_learning() {
        os.line(format!("void {}(SimContext *ctx, scalar t);", learning::POST_FN));
    }
    os.line(format!("{};", neuron::signature(model, crate::runner::STEP_TIME)));
    os.blank();
    os.line("#endif");
    os.finish(FILE)
}
