//! Neuron update emission (`neuronFnct.cc`).
//!
//! Per population and step: advance the ring pointer, clear the current
//! slot's counts, then for every neuron load state into locals, sum the
//! synaptic input, capture `oldSpike`, run the model's update, register
//! spike events and rising-edge true spikes, write state back and let each
//! incoming postsynaptic model decay its accumulator.

use snnc_model::{InputCurrent, ModelSpec, NeuronGroup, SpikeKind, SynapseGroup};

use crate::backend::{open_group_block, Backend, EmitContext};
use crate::code_stream::CodeStream;
use crate::naming::{
    extra_global_arg, field, in_syn_local, input_arg, previous_slot_expr, que_ptr, spike_count,
    spike_entry, var_is_queued, SlotIndex,
};
use crate::substitution::{LayerKind, SymbolTable};
use crate::Result;

/// Generated file name
pub const FILE: &str = "neuronFnct.cc";

/// Name of the generated neuron step
pub const STEP_FN: &str = "calcNeuronsCPU";

/// Render a C parameter, gluing pointer stars to the name
pub fn c_param(ty: &str, name: &str) -> String {
    if ty.ends_with('*') {
        format!("{ty}{name}")
    } else {
        format!("{ty} {name}")
    }
}

/// Externally supplied arguments of the neuron step as `(type, name)`, in group order:
/// extra global parameters first, then per-neuron input arrays
pub fn step_params(model: &ModelSpec) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for (_, ng) in model.neuron_groups() {
        for eg in &ng.model().extra_global_params {
            params.push((eg.ty.clone(), extra_global_arg(&eg.name, ng.name())));
        }
    }
    for (_, ng) in model.neuron_groups() {
        if ng.input() == InputCurrent::PerNeuron {
            params.push(("scalar *".to_string(), input_arg(ng.name())));
        }
    }
    params
}

/// `void <name>(SimContext *ctx, <step params>, scalar t)`
pub fn signature(model: &ModelSpec, name: &str) -> String {
    let mut args = vec!["SimContext *ctx".to_string()];
    args.extend(step_params(model).iter().map(|(ty, n)| c_param(ty, n)));
    args.push("scalar t".to_string());
    format!("void {name}({})", args.join(", "))
}

/// Argument list forwarding the step parameters
pub fn call_args(model: &ModelSpec) -> String {
    let mut args = vec!["ctx".to_string()];
    args.extend(step_params(model).into_iter().map(|(_, n)| n));
    args.push("t".to_string());
    args.join(", ")
}

fn bind_builtins(table: &mut SymbolTable) -> Result<()> {
    table.bind(LayerKind::Builtins, "id", "n")?;
    table.bind(LayerKind::Builtins, "t", "t")?;
    table.bind(LayerKind::Builtins, "DT", "DT")
}

fn bind_own_params(cx: &EmitContext<'_>, ng: &NeuronGroup, table: &mut SymbolTable) -> Result<()> {
    let m = ng.model();
    table.bind_values(LayerKind::Params, &m.params, ng.params(), cx.precision())?;
    table.bind_values(
        LayerKind::DerivedParams,
        m.derived_params.iter().map(|d| d.name.clone()),
        ng.derived_params(),
        cx.precision(),
    )
}

/// Symbols of a neuron model's sim, threshold and reset code
pub fn neuron_table(cx: &EmitContext<'_>, ng: &NeuronGroup) -> Result<SymbolTable> {
    let mut table = SymbolTable::new();
    for v in &ng.model().vars {
        table.bind(LayerKind::Vars, &v.name, format!("l{}", v.name))?;
    }
    table.bind(LayerKind::SynapticInput, "Isyn", "Isyn")?;
    bind_own_params(cx, ng, &mut table)?;
    for eg in &ng.model().extra_global_params {
        table.bind(
            LayerKind::ExtraGlobals,
            &eg.name,
            extra_global_arg(&eg.name, ng.name()),
        )?;
    }
    bind_builtins(&mut table)?;
    Ok(table)
}

/// Symbols of a registered spike-event condition, evaluated on the source's locals
fn event_table(ng: &NeuronGroup) -> Result<SymbolTable> {
    let mut table = SymbolTable::new();
    for v in &ng.model().vars {
        table.bind(LayerKind::Vars, format!("{}_pre", v.name), format!("l{}", v.name))?;
    }
    for eg in &ng.model().extra_global_params {
        table.bind(
            LayerKind::ExtraGlobals,
            format!("{}_pre", eg.name),
            extra_global_arg(&eg.name, ng.name()),
        )?;
    }
    bind_builtins(&mut table)?;
    Ok(table)
}

/// Symbols of the apply-input and decay code of the `j`-th incoming group
pub fn postsynaptic_table(
    cx: &EmitContext<'_>,
    ng: &NeuronGroup,
    sg: &SynapseGroup,
    j: usize,
) -> Result<SymbolTable> {
    let mut table = SymbolTable::new();
    for v in &ng.model().vars {
        table.bind(LayerKind::Vars, &v.name, format!("l{}", v.name))?;
    }
    table.bind(
        LayerKind::SynapticInput,
        "inSyn",
        format!("{}[n]", in_syn_local(ng.name(), j)),
    )?;
    bind_own_params(cx, ng, &mut table)?;
    let ps = sg.ps_model();
    table.bind_values(LayerKind::Postsynaptic, &ps.params, sg.ps_params(), cx.precision())?;
    table.bind_values(
        LayerKind::Postsynaptic,
        ps.derived_params.iter().map(|d| d.name.clone()),
        sg.ps_derived_params(),
        cx.precision(),
    )?;
    for v in &ps.vars {
        table.bind(
            LayerKind::Postsynaptic,
            &v.name,
            format!("{}[n]", field(sg.name(), &v.name)),
        )?;
    }
    bind_builtins(&mut table)?;
    Ok(table)
}

/// Write `calcNeuronsCPU` through `backend`
pub fn emit_neuron_update(
    cx: &EmitContext<'_>,
    backend: &dyn Backend,
    os: &mut CodeStream,
) -> Result<()> {
    os.open_with(signature(cx.model, STEP_FN), 0);
    for (_, ng) in cx.model.neuron_groups() {
        emit_group(cx, backend, ng, os)?;
    }
    os.close(0);
    Ok(())
}

fn emit_group(
    cx: &EmitContext<'_>,
    backend: &dyn Backend,
    ng: &NeuronGroup,
    os: &mut CodeStream,
) -> Result<()> {
    let name = ng.name();
    let n = ng.num_neurons();
    let ring = ng.delay_ring();
    let ptr = que_ptr(ng);
    let vars = &ng.model().vars;

    os.comment(format!("neuron group {name}"));
    if ring.is_delayed() {
        os.line(format!("{ptr} = ({ptr} + 1) % {};", ring.slots()));
    }
    open_group_block(backend, ng.host_id(), os, 10);

    let slot = SlotIndex::for_ring(ring, &ptr, n);
    os.line(format!("{} = 0;", spike_count(ng, SpikeKind::True, &slot)));
    if ng.needs_spike_events() {
        os.line(format!("{} = 0;", spike_count(ng, SpikeKind::Event, &slot)));
    }
    let any_queued = (0..vars.len()).any(|i| var_is_queued(ng, i));
    if any_queued {
        os.line(format!("unsigned int readDelayOffset = ({}) * {n};", previous_slot_expr(ng)));
        os.line(format!("unsigned int writeDelayOffset = {ptr} * {n};"));
    }
    let incoming: Vec<&SynapseGroup> = ng
        .in_syn()
        .iter()
        .map(|id| cx.model.synapse_group(*id))
        .collect();
    for (j, sg) in incoming.iter().enumerate() {
        os.line(format!(
            "scalar *{} = {};",
            in_syn_local(name, j),
            field(sg.name(), "inSyn")
        ));
    }
    os.blank();

    if let Some(pragma) = backend.neuron_loop_pragma() {
        os.line(pragma);
    }
    os.open_with(format!("for (unsigned int n = 0; n < {n}; n++)"), 11);
    for (i, v) in vars.iter().enumerate() {
        let idx = if var_is_queued(ng, i) { "readDelayOffset + n" } else { "n" };
        os.line(format!("{} l{} = {}[{idx}];", v.ty, v.name, field(name, &v.name)));
    }
    os.blank();

    os.line("scalar Isyn = 0;");
    match ng.input() {
        InputCurrent::None => {}
        InputCurrent::Constant(value) => os.line(format!("Isyn += {};", cx.literal(value))),
        InputCurrent::PerNeuron => os.line(format!("Isyn += {}[n];", input_arg(name))),
    }
    let mut ps_tables = Vec::with_capacity(incoming.len());
    for (j, sg) in incoming.iter().enumerate() {
        let table = postsynaptic_table(cx, ng, sg, j)?;
        let apply = table.substitute(
            &sg.ps_model().apply_input_code,
            &format!("apply input code of synapse group '{}'", sg.name()),
        )?;
        if !apply.trim().is_empty() {
            os.comment(format!("input from {}", sg.name()));
            os.line(format!("Isyn += {apply};"));
        }
        ps_tables.push(table);
    }

    let table = neuron_table(cx, ng)?;
    let model = ng.model();
    let threshold = model
        .threshold_condition_code
        .as_deref()
        .map(|code| table.substitute(code, &format!("threshold condition of '{name}'")))
        .transpose()?;
    if let Some(thr) = &threshold {
        os.line(format!("bool oldSpike = ({thr});"));
    }
    os.blank();

    if !model.sim_code.trim().is_empty() {
        os.comment("calculate membrane potential");
        os.line(table.substitute(&model.sim_code, &format!("sim code of '{name}'"))?);
        os.blank();
    }

    if ng.needs_spike_events() {
        let evt = event_table(ng)?;
        let conditions = ng
            .spike_event_conditions()
            .map(|(code, ns)| {
                evt.substitute(code, &format!("spike event condition of '{ns}'"))
                    .map(|c| format!("({c})"))
            })
            .collect::<Result<Vec<_>>>()?;
        if !conditions.is_empty() {
            os.line(format!("bool spikeLikeEvent = {};", conditions.join(" || ")));
            os.open_with("if (spikeLikeEvent)", 12);
            backend.spike_append(
                os,
                &spike_count(ng, SpikeKind::Event, &slot),
                &|pos: &str| spike_entry(ng, SpikeKind::Event, &slot, pos),
                "n",
            );
            os.close(12);
        }
    }

    if let Some(thr) = &threshold {
        os.comment("test for and register a true spike");
        os.open_with(format!("if (({thr}) && !(oldSpike))"), 13);
        backend.spike_append(
            os,
            &spike_count(ng, SpikeKind::True, &slot),
            &|pos: &str| spike_entry(ng, SpikeKind::True, &slot, pos),
            "n",
        );
        if ng.needs_spike_time() {
            os.line(format!("{}[n] = t;", field(name, "sT")));
        }
        if let Some(reset) = &model.reset_code {
            os.comment("reset");
            os.line(table.substitute(reset, &format!("reset code of '{name}'"))?);
        }
        os.close(13);
    }

    for (i, v) in vars.iter().enumerate() {
        let idx = if var_is_queued(ng, i) { "writeDelayOffset + n" } else { "n" };
        os.line(format!("{}[{idx}] = l{};", field(name, &v.name), v.name));
    }

    for (sg, table) in incoming.iter().zip(&ps_tables) {
        let decay = table.substitute(
            &sg.ps_model().decay_code,
            &format!("decay code of synapse group '{}'", sg.name()),
        )?;
        if !decay.trim().is_empty() {
            os.line(decay);
        }
    }
    os.close(11);
    os.close(10);
    os.blank();
    Ok(())
}

/// Write the whole `neuronFnct.cc`
pub fn emit_file(cx: &EmitContext<'_>, backend: &dyn Backend) -> Result<String> {
    let mut os = CodeStream::new();
    os.comment(format!("neuron update of model {}", cx.model.name()));
    os.line("#include \"definitions.h\"");
    os.blank();
    backend.emit_neuron_update(cx, &mut os)?;
    os.finish(FILE)
}
