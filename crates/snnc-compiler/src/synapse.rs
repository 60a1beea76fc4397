//! Synapse propagation emission (`synapseFnct.cc`).

use snnc_model::delay::effective_delay;
use snnc_model::{SpikeKind, SynapseGroup};

use crate::backend::{open_group_block, Backend, EmitContext};
use crate::code_stream::CodeStream;
use crate::connectivity::{for_each_connection, weight_expr};
use crate::learning;
use crate::naming::{
    field, in_syn_local, que_ptr, read_slot_expr, spike_count, spike_entry, var_is_queued,
    SlotIndex,
};
use crate::substitution::{LayerKind, SymbolTable};
use crate::Result;

/// Generated file name
pub const FILE: &str = "synapseFnct.cc";

/// Local holding the slot a delayed source is read from
pub const PRE_SLOT: &str = "preReadDelaySlot";

/// Slot of the source population this group reads
pub fn source_slot(cx: &EmitContext<'_>, sg: &SynapseGroup) -> SlotIndex {
    let src = cx.model.neuron_group(sg.src());
    SlotIndex::for_ring(src.delay_ring(), PRE_SLOT, src.num_neurons())
}

/// Symbols of weight update code, without the weight itself.
///
/// `<var>_pre` reads the source at the delayed slot, `<var>_post` the
/// target's current state.
pub fn synapse_table(
    cx: &EmitContext<'_>,
    sg: &SynapseGroup,
    slot: &SlotIndex,
) -> Result<SymbolTable> {
    let src = cx.model.neuron_group(sg.src());
    let trg = cx.model.neuron_group(sg.trg());
    let mut table = SymbolTable::new();
    for (i, v) in src.model().vars.iter().enumerate() {
        let idx = if var_is_queued(src, i) {
            slot.element("ipre")
        } else {
            "ipre".to_string()
        };
        table.bind(
            LayerKind::Vars,
            format!("{}_pre", v.name),
            format!("{}[{idx}]", field(src.name(), &v.name)),
        )?;
    }
    for (i, v) in trg.model().vars.iter().enumerate() {
        let idx = if var_is_queued(trg, i) {
            format!("({} * {}) + ipost", que_ptr(trg), trg.num_neurons())
        } else {
            "ipost".to_string()
        };
        table.bind(
            LayerKind::Vars,
            format!("{}_post", v.name),
            format!("{}[{idx}]", field(trg.name(), &v.name)),
        )?;
    }
    table.bind(
        LayerKind::SynapticInput,
        "inSyn",
        format!("{}[ipost]", in_syn_local(trg.name(), sg.target_input_index())),
    )?;
    let wu = sg.wu_model();
    table.bind_values(LayerKind::Params, &wu.params, sg.wu_params(), cx.precision())?;
    table.bind_values(
        LayerKind::DerivedParams,
        wu.derived_params.iter().map(|d| d.name.clone()),
        sg.wu_derived_params(),
        cx.precision(),
    )?;
    table.bind(LayerKind::Builtins, "id_pre", "ipre")?;
    table.bind(LayerKind::Builtins, "id_post", "ipost")?;
    table.bind(LayerKind::Builtins, "t", "t")?;
    table.bind(LayerKind::Builtins, "DT", "DT")?;
    Ok(table)
}

/// Write `calcSynapsesCPU` through `backend`
pub fn emit_synapse_update(
    cx: &EmitContext<'_>,
    backend: &dyn Backend,
    os: &mut CodeStream,
) -> Result<()> {
    os.open_with("void calcSynapsesCPU(SimContext *ctx, scalar t)", 0);
    for (_, sg) in cx.model.synapse_groups() {
        emit_group(cx, backend, sg, os)?;
    }
    os.close(0);
    Ok(())
}

fn emit_group(
    cx: &EmitContext<'_>,
    backend: &dyn Backend,
    sg: &SynapseGroup,
    os: &mut CodeStream,
) -> Result<()> {
    let src = cx.model.neuron_group(sg.src());
    let trg = cx.model.neuron_group(sg.trg());
    let context = format!("synapse group '{}'", sg.name());

    os.comment(format!(
        "synapse group {} ({} -> {}, {})",
        sg.name(),
        src.name(),
        trg.name(),
        sg.connectivity().as_str()
    ));
    open_group_block(backend, sg.host_id(), os, 20);
    if src.is_delay_required() {
        os.line(format!(
            "unsigned int {PRE_SLOT} = {};",
            read_slot_expr(src, effective_delay(sg.delay_steps()))
        ));
    }
    let slot = source_slot(cx, sg);
    let in_syn = in_syn_local(trg.name(), sg.target_input_index());
    os.line(format!("scalar *{in_syn} = {};", field(sg.name(), "inSyn")));

    let mut table = synapse_table(cx, sg, &slot)?;
    let weight = weight_expr(cx, sg, &table)?;
    table.bind(LayerKind::SynapticInput, "g", weight)?;
    let input = table.substitute(&sg.wu_model().input_code, &format!("input code of {context}"))?;
    let condition = sg
        .event_condition()
        .map(|code| table.substitute(code, &format!("event condition of {context}")))
        .transpose()?;
    let kind = if sg.is_event_driven() {
        SpikeKind::Event
    } else {
        SpikeKind::True
    };

    os.open_with(
        format!("for (unsigned int i = 0; i < {}; i++)", spike_count(src, kind, &slot)),
        21,
    );
    os.line(format!("unsigned int ipre = {};", spike_entry(src, kind, &slot, "i")));
    for_each_connection(os, sg, trg.num_neurons(), 22, |os| {
        if let Some(cond) = &condition {
            os.open_with(format!("if ({cond})"), 24);
        }
        os.line(format!("scalar addtoinSyn = {input};"));
        os.line(format!("{in_syn}[ipost] += addtoinSyn;"));
        if condition.is_some() {
            os.close(24);
        }
        Ok(())
    })?;
    os.close(21);

    if sg.is_learning() {
        learning::emit_presynaptic_learning(cx, sg, &slot, os)?;
    }
    os.close(20);
    os.blank();
    Ok(())
}

/// Write the whole `synapseFnct.cc`
pub fn emit_file(cx: &EmitContext<'_>, backend: &dyn Backend) -> Result<String> {
    let mut os = CodeStream::new();
    os.comment(format!("synapse update of model {}", cx.model.name()));
    os.line("#include \"definitions.h\"");
    os.blank();
    learning::emit_helpers(cx, &mut os);
    backend.emit_synapse_update(cx, &mut os)?;
    if cx.model.any_learning() {
        os.blank();
        backend.emit_postsynaptic_learning(cx, &mut os)?;
    }
    os.finish(FILE)
}
