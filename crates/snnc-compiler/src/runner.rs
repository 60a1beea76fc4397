//! Host runner emission (`runner.cc`).
//!
//! Allocation, initialisation, sparse connectivity helpers and the
//! `stepTimeCPU` driver. A `SimContext` is expected to start zeroed; under
//! MPI `initMPI` fills in `hostID` before `allocateMem` runs.

use snnc_model::{Connectivity, NeuronGroup, SynapseGroup};

use crate::backend::{Backend, EmitContext};
use crate::code_stream::CodeStream;
use crate::connectivity::{addresses_synapse, bitmask_words};
use crate::learning::{self, needs_reverse_index};
use crate::naming::{field, spike_count_len, spike_list_len, var_len};
use crate::{neuron, Result};

/// Generated file name
pub const FILE: &str = "runner.cc";

/// Name of the whole-step driver
pub const STEP_TIME: &str = "stepTimeCPU";

/// Initial spike time, far enough in the past to never pair with a first spike
pub const INITIAL_SPIKE_TIME: f64 = -10.0;

/// Return codes of `load<SG>`
pub mod load_status {
    /// File could not be opened
    pub const OPEN: i32 = -1;
    /// File length does not match any connection count
    pub const SIZE: i32 = -2;
    /// A section ended early
    pub const SHORT_READ: i32 = -3;
}

fn alloc(os: &mut CodeStream, owner: &str, name: &str, ty: &str, count: impl std::fmt::Display) {
    os.line(format!(
        "{} = ({ty} *) calloc({count}, sizeof({ty}));",
        field(owner, name)
    ));
}

/// C initialiser for a value of C type `ty`
fn init_value(cx: &EmitContext<'_>, ty: &str, value: f64) -> String {
    match ty {
        "scalar" | "float" | "double" => cx.literal(value),
        _ => format!("{}", value.round() as i64),
    }
}

fn fill(os: &mut CodeStream, target: &str, count: impl std::fmt::Display, value: &str) {
    os.open_with(format!("for (unsigned int i = 0; i < {count}; i++)"), 50);
    os.line(format!("{target}[i] = {value};"));
    os.close(50);
}

fn neuron_arrays(ng: &NeuronGroup) -> Vec<(&'static str, String, u64)> {
    let mut arrays = vec![
        ("unsigned int", "glbSpkCnt".to_string(), u64::from(spike_count_len(ng))),
        ("unsigned int", "glbSpk".to_string(), spike_list_len(ng)),
    ];
    if ng.needs_spike_events() {
        arrays.push(("unsigned int", "glbSpkCntEvnt".to_string(), u64::from(spike_count_len(ng))));
        arrays.push(("unsigned int", "glbSpkEvnt".to_string(), spike_list_len(ng)));
    }
    if ng.needs_spike_time() {
        arrays.push(("scalar", "sT".to_string(), u64::from(ng.num_neurons())));
    }
    arrays
}

fn emit_allocate_mem(cx: &EmitContext<'_>, os: &mut CodeStream) {
    os.open_with("void allocateMem(SimContext *ctx)", 0);
    for (_, ng) in cx.model.neuron_groups() {
        os.comment(format!("neuron group {}", ng.name()));
        for (ty, name, len) in neuron_arrays(ng) {
            alloc(os, ng.name(), &name, ty, len);
        }
        for (i, v) in ng.model().vars.iter().enumerate() {
            alloc(os, ng.name(), &v.name, &v.ty, var_len(ng, i));
        }
    }
    for (_, sg) in cx.model.synapse_groups() {
        let n_pre = cx.model.neuron_group(sg.src()).num_neurons();
        let n_post = cx.model.neuron_group(sg.trg()).num_neurons();
        let name = sg.name();
        os.comment(format!("synapse group {name}"));
        alloc(os, name, "inSyn", "scalar", n_post);
        for v in &sg.ps_model().vars {
            alloc(os, name, &v.name, &v.ty, n_post);
        }
        match sg.connectivity() {
            Connectivity::Dense => {
                let n = u64::from(n_pre) * u64::from(n_post);
                if addresses_synapse(sg) {
                    alloc(os, name, "g", "scalar", n);
                }
                if sg.is_learning() {
                    alloc(os, name, "gRaw", "scalar", n);
                }
            }
            Connectivity::Sparse => {
                os.line(format!("{} = 0;", field(name, "connN")));
                alloc(os, name, "indInG", "unsigned int", u64::from(n_pre) + 1);
                if needs_reverse_index(sg) {
                    alloc(os, name, "revIndInG", "unsigned int", u64::from(n_post) + 1);
                }
            }
            Connectivity::Bitmask => {
                alloc(os, name, "gp", "uint32_t", bitmask_words(n_pre, n_post));
            }
        }
    }
    os.close(0);
    os.blank();
}

fn sparse_fields(sg: &SynapseGroup) -> Vec<&'static str> {
    let mut fields = vec!["ind"];
    if addresses_synapse(sg) {
        fields.push("g");
    }
    if sg.is_learning() {
        fields.push("gRaw");
    }
    if needs_reverse_index(sg) {
        fields.extend(["revInd", "remap"]);
    }
    fields
}

fn emit_free_mem(cx: &EmitContext<'_>, os: &mut CodeStream) {
    os.open_with("void freeMem(SimContext *ctx)", 0);
    for (_, ng) in cx.model.neuron_groups() {
        for (_, name, _) in neuron_arrays(ng) {
            os.line(format!("free({});", field(ng.name(), &name)));
        }
        for v in &ng.model().vars {
            os.line(format!("free({});", field(ng.name(), &v.name)));
        }
    }
    for (_, sg) in cx.model.synapse_groups() {
        let name = sg.name();
        let mut fields = vec!["inSyn"];
        fields.extend(sg.ps_model().vars.iter().map(|v| v.name.as_str()));
        match sg.connectivity() {
            Connectivity::Dense => {
                if addresses_synapse(sg) {
                    fields.push("g");
                }
                if sg.is_learning() {
                    fields.push("gRaw");
                }
            }
            Connectivity::Sparse => {
                fields.push("indInG");
                if needs_reverse_index(sg) {
                    fields.push("revIndInG");
                }
                fields.extend(sparse_fields(sg));
            }
            Connectivity::Bitmask => fields.push("gp"),
        }
        for f in fields {
            os.line(format!("free({});", field(name, f)));
        }
    }
    os.close(0);
    os.blank();
}

fn emit_initialize(cx: &EmitContext<'_>, os: &mut CodeStream) {
    os.open_with("void initialize(SimContext *ctx)", 0);
    for (_, ng) in cx.model.neuron_groups() {
        let name = ng.name();
        os.comment(format!("neuron group {name}"));
        if ng.delay_ring().is_delayed() {
            os.line(format!("{} = 0;", field(name, "spkQuePtr")));
        }
        if ng.needs_spike_time() {
            fill(
                os,
                &field(name, "sT"),
                ng.num_neurons(),
                &cx.literal(INITIAL_SPIKE_TIME),
            );
        }
        for (i, (v, value)) in ng.model().vars.iter().zip(ng.init_vals()).enumerate() {
            fill(os, &field(name, &v.name), var_len(ng, i), &init_value(cx, &v.ty, *value));
        }
    }
    for (_, sg) in cx.model.synapse_groups() {
        let n_post = cx.model.neuron_group(sg.trg()).num_neurons();
        let name = sg.name();
        os.comment(format!("synapse group {name}"));
        fill(os, &field(name, "inSyn"), n_post, &cx.literal(0.0));
        for (v, value) in sg.ps_model().vars.iter().zip(sg.ps_init_vals()) {
            fill(os, &field(name, &v.name), n_post, &init_value(cx, &v.ty, *value));
        }
    }
    os.close(0);
    os.blank();
}

fn emit_allocate_sparse(sg: &SynapseGroup, os: &mut CodeStream) {
    let name = sg.name();
    os.open_with(
        format!("void allocate{name}(SimContext *ctx, unsigned int connN)"),
        0,
    );
    os.line(format!("{} = connN;", field(name, "connN")));
    for f in sparse_fields(sg) {
        let ty = if matches!(f, "g" | "gRaw") { "scalar" } else { "unsigned int" };
        os.line(format!("free({});", field(name, f)));
        alloc(os, name, f, ty, "connN");
    }
    os.close(0);
    os.blank();
}

fn emit_bail(os: &mut CodeStream, condition: &str, status: i32, id: u32) {
    os.open_with(format!("if ({condition})"), id);
    os.line("fclose(f);");
    os.line(format!("return {status};"));
    os.close(id);
}

fn emit_load_sparse(cx: &EmitContext<'_>, sg: &SynapseGroup, os: &mut CodeStream) {
    let name = sg.name();
    let n_pre = cx.model.neuron_group(sg.src()).num_neurons();
    let ind_in_g = field(name, "indInG");
    let ind = field(name, "ind");

    os.open_with(
        format!("int load{name}(SimContext *ctx, const char *path)"),
        0,
    );
    os.line("FILE *f = fopen(path, \"rb\");");
    os.open_with("if (f == NULL)", 1);
    os.line(format!("return {};", load_status::OPEN));
    os.close(1);
    os.line("fseek(f, 0, SEEK_END);");
    os.line("long size = ftell(f);");
    os.line("fseek(f, 0, SEEK_SET);");
    os.line(format!("long rows = (long) ({n_pre} + 1) * (long) sizeof(unsigned int);"));
    os.line("long perConn = (long) (sizeof(scalar) + sizeof(unsigned int));");
    emit_bail(os, "size < rows || (size - rows) % perConn != 0", load_status::SIZE, 2);
    os.line("unsigned int connN = (unsigned int) ((size - rows) / perConn);");
    os.line(format!("allocate{name}(ctx, connN);"));
    if addresses_synapse(sg) {
        emit_bail(
            os,
            &format!("fread({}, sizeof(scalar), connN, f) != connN", field(name, "g")),
            load_status::SHORT_READ,
            3,
        );
    } else {
        os.line("fseek(f, (long) connN * (long) sizeof(scalar), SEEK_CUR);");
    }
    emit_bail(
        os,
        &format!("fread({ind_in_g}, sizeof(unsigned int), {n_pre} + 1, f) != {n_pre} + 1"),
        load_status::SHORT_READ,
        4,
    );
    emit_bail(
        os,
        &format!("fread({ind}, sizeof(unsigned int), connN, f) != connN"),
        load_status::SHORT_READ,
        5,
    );
    os.line("fclose(f);");
    os.line("return 0;");
    os.close(0);
    os.blank();
}

fn emit_post_to_pre(os: &mut CodeStream) {
    os.line("static void buildPostToPre(unsigned int nPre, unsigned int nPost,");
    os.line("    const unsigned int *indInG, const unsigned int *ind,");
    os.line("    unsigned int *revIndInG, unsigned int *revInd, unsigned int *remap)");
    os.open(0);
    os.line("unsigned int connN = indInG[nPre];");
    os.line("unsigned int *fillCount = (unsigned int *) calloc(nPost, sizeof(unsigned int));");
    fill(os, "revIndInG", "nPost + 1", "0");
    os.open_with("for (unsigned int s = 0; s < connN; s++)", 1);
    os.line("revIndInG[ind[s] + 1]++;");
    os.close(1);
    os.open_with("for (unsigned int j = 0; j < nPost; j++)", 2);
    os.line("revIndInG[j + 1] += revIndInG[j];");
    os.close(2);
    os.open_with("for (unsigned int i = 0; i < nPre; i++)", 3);
    os.open_with("for (unsigned int s = indInG[i]; s < indInG[i + 1]; s++)", 4);
    os.line("unsigned int j = ind[s];");
    os.line("unsigned int pos = revIndInG[j] + fillCount[j]++;");
    os.line("revInd[pos] = i;");
    os.line("remap[pos] = s;");
    os.close(4);
    os.close(3);
    os.line("free(fillCount);");
    os.close(0);
    os.blank();
}

fn emit_initialize_sparse(cx: &EmitContext<'_>, os: &mut CodeStream) {
    os.open_with("void initializeSparse(SimContext *ctx)", 0);
    for (_, sg) in cx.model.synapse_groups() {
        if !needs_reverse_index(sg) {
            continue;
        }
        let name = sg.name();
        let n_pre = cx.model.neuron_group(sg.src()).num_neurons();
        let n_post = cx.model.neuron_group(sg.trg()).num_neurons();
        os.comment(format!("synapse group {name}"));
        os.line(format!(
            "buildPostToPre({n_pre}, {n_post}, {}, {}, {}, {}, {});",
            field(name, "indInG"),
            field(name, "ind"),
            field(name, "revIndInG"),
            field(name, "revInd"),
            field(name, "remap")
        ));
        os.line(format!(
            "memcpy({}, {}, {} * sizeof(scalar));",
            field(name, "gRaw"),
            field(name, "g"),
            field(name, "connN")
        ));
    }
    os.close(0);
    os.blank();
}

fn emit_step_time(cx: &EmitContext<'_>, backend: &dyn Backend, os: &mut CodeStream) -> Result<()> {
    os.open_with(neuron::signature(cx.model, STEP_TIME), 0);
    os.line(format!("{}({});", neuron::STEP_FN, neuron::call_args(cx.model)));
    backend.emit_cross_host_sync(cx, os)?;
    os.line("calcSynapsesCPU(ctx, t);");
    if cx.model.any_learning() {
        os.line(format!("{}(ctx, t);", learning::POST_FN));
    }
    os.close(0);
    Ok(())
}

/// Write the whole `runner.cc`
pub fn emit(cx: &EmitContext<'_>, backend: &dyn Backend) -> Result<String> {
    let mut os = CodeStream::new();
    os.comment(format!("host runner of model {}", cx.model.name()));
    os.line("#include \"definitions.h\"");
    for include in backend.runner_includes() {
        os.line(format!("#include {include}"));
    }
    os.blank();

    emit_allocate_mem(cx, &mut os);
    emit_free_mem(cx, &mut os);
    emit_initialize(cx, &mut os);

    for (_, sg) in cx.model.synapse_groups() {
        if sg.connectivity() != Connectivity::Sparse {
            continue;
        }
        emit_allocate_sparse(sg, &mut os);
        if cx.config.sparse_loaders {
            emit_load_sparse(cx, sg, &mut os);
        }
    }
    if cx.model.synapse_groups().any(|(_, sg)| needs_reverse_index(sg)) {
        emit_post_to_pre(&mut os);
        emit_initialize_sparse(cx, &mut os);
    }

    emit_step_time(cx, backend, &mut os)?;
    os.finish(FILE)
}
