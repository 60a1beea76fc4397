//! Piecewise spike-timing learning.
//!
//! Learning groups keep a raw weight `gRaw` and an effective weight `g`.
//! Every pairing adds `learnDelta<SG>(dt)` to the raw weight and recomputes
//! the effective one through the saturating `gFunc<SG>`. The presynaptic pass
//! runs inside `calcSynapsesCPU` on the source's true spikes; the shared
//! postsynaptic pass `learnSynapsesPost` runs on the target's true spikes
//! over every connected source neuron. When the weight update model declares
//! an `Epre` parameter, post pairings only count while the target's `V` is
//! above it.

use snnc_model::{Connectivity, NeuronGroup, PiecewiseRule, SpikeKind, SynapseGroup};

use crate::backend::{open_group_block, Backend, EmitContext};
use crate::code_stream::CodeStream;
use crate::connectivity::{for_each_connection, for_each_incoming};
use crate::naming::{field, que_ptr, spike_count, spike_entry, var_is_queued, SlotIndex};
use crate::{CompilerError, Result};

/// Name of the shared postsynaptic learning function
pub const POST_FN: &str = "learnSynapsesPost";

/// Name of the weight function of a group
pub fn g_func_name(sg: &SynapseGroup) -> String {
    format!("gFunc{}", sg.name())
}

/// Name of the weight-change function of a group
pub fn delta_name(sg: &SynapseGroup) -> String {
    format!("learnDelta{}", sg.name())
}

/// True when postsynaptic learning walks a generated reverse index
pub fn needs_reverse_index(sg: &SynapseGroup) -> bool {
    sg.is_learning() && sg.connectivity() == Connectivity::Sparse
}

fn rule_of(sg: &SynapseGroup) -> Result<&PiecewiseRule> {
    sg.learning().ok_or_else(|| {
        CompilerError::Message(format!("synapse group '{}' has no learning rule", sg.name()))
    })
}

/// `V_post > Epre` for models that declare `Epre` and targets that have `V`
fn post_voltage_gate(
    cx: &EmitContext<'_>,
    sg: &SynapseGroup,
    trg: &NeuronGroup,
    slot: &SlotIndex,
) -> Option<String> {
    let epre = sg.wu_model().params.iter().position(|p| p == "Epre")?;
    let epre = *sg.wu_params().get(epre)?;
    let v = trg.model().vars.iter().position(|v| v.name == "V")?;
    let idx = if var_is_queued(trg, v) {
        slot.element("ipost")
    } else {
        "ipost".to_string()
    };
    Some(format!(
        "{}[{idx}] > {}",
        field(trg.name(), "V"),
        cx.literal(epre)
    ))
}

/// Emit `gFunc<SG>` and `learnDelta<SG>` for every learning group
pub fn emit_helpers(cx: &EmitContext<'_>, os: &mut CodeStream) {
    for (_, sg) in cx.model.synapse_groups() {
        let Some(rule) = sg.learning() else {
            continue;
        };
        let lit = |v: f64| cx.literal(v);

        os.open_with(format!("static inline scalar {}(scalar x)", g_func_name(sg)), 60);
        os.line(format!(
            "return {} * (tanh({} * (x - {})) + {});",
            lit(rule.g_max / 2.0),
            lit(rule.g_slope),
            lit(rule.g_mid),
            lit(1.0)
        ));
        os.close(60);
        os.blank();

        os.open_with(format!("static inline scalar {}(scalar dt)", delta_name(sg)), 61);
        os.open_with(format!("if (dt > {})", lit(rule.k1)), 62);
        os.line(format!("return -{};", lit(rule.depress_max)));
        os.close(62);
        os.open_with(format!("else if (dt > {})", lit(rule.k2)), 63);
        os.line(format!("return {} * dt + {};", lit(rule.slope_pos), lit(rule.offset)));
        os.close(63);
        os.open_with(format!("else if (dt > {})", lit(rule.k3)), 64);
        os.line(format!("return {} * dt + {};", lit(rule.slope_neg), lit(rule.offset)));
        os.close(64);
        os.line(format!("return -{};", lit(rule.depress_min)));
        os.close(61);
        os.blank();
    }
}

fn emit_weight_update(sg: &SynapseGroup, os: &mut CodeStream) {
    let g_raw = field(sg.name(), "gRaw");
    os.line(format!("{g_raw}[syn] += {}(dt);", delta_name(sg)));
    os.line(format!(
        "{}[syn] = {}({g_raw}[syn]);",
        field(sg.name(), "g"),
        g_func_name(sg)
    ));
}

/// Presynaptic pass, emitted inside the group's block of `calcSynapsesCPU`
pub fn emit_presynaptic_learning(
    cx: &EmitContext<'_>,
    sg: &SynapseGroup,
    slot: &SlotIndex,
    os: &mut CodeStream,
) -> Result<()> {
    let rule = rule_of(sg)?;
    let src = cx.model.neuron_group(sg.src());
    let trg = cx.model.neuron_group(sg.trg());
    let shift = cx.literal(rule.t_shift);

    os.comment("learning on presynaptic true spikes");
    os.open_with(
        format!(
            "for (unsigned int i = 0; i < {}; i++)",
            spike_count(src, SpikeKind::True, slot)
        ),
        30,
    );
    os.line(format!("unsigned int ipre = {};", spike_entry(src, SpikeKind::True, slot, "i")));
    for_each_connection(os, sg, trg.num_neurons(), 31, |os| {
        os.line(format!("scalar dt = {}[ipost] - t - {shift};", field(trg.name(), "sT")));
        emit_weight_update(sg, os);
        Ok(())
    })?;
    os.close(30);
    Ok(())
}

/// Write `learnSynapsesPost` through `backend`
pub fn emit_postsynaptic_learning(
    cx: &EmitContext<'_>,
    backend: &dyn Backend,
    os: &mut CodeStream,
) -> Result<()> {
    os.open_with(format!("void {POST_FN}(SimContext *ctx, scalar t)"), 0);
    for (_, sg) in cx.model.synapse_groups() {
        if !sg.is_learning() {
            continue;
        }
        let rule = rule_of(sg)?;
        let src = cx.model.neuron_group(sg.src());
        let trg = cx.model.neuron_group(sg.trg());
        let slot = SlotIndex::for_ring(trg.delay_ring(), &que_ptr(trg), trg.num_neurons());
        let shift = cx.literal(rule.t_shift);
        let delay_term = if src.is_delay_required() && sg.delay_steps() > 0 {
            format!(" + DT * {}", sg.delay_steps())
        } else {
            String::new()
        };

        os.comment(format!("synapse group {}", sg.name()));
        open_group_block(backend, sg.host_id(), os, 40);
        os.open_with(
            format!(
                "for (unsigned int i = 0; i < {}; i++)",
                spike_count(trg, SpikeKind::True, &slot)
            ),
            41,
        );
        os.line(format!(
            "unsigned int ipost = {};",
            spike_entry(trg, SpikeKind::True, &slot, "i")
        ));
        let gate = post_voltage_gate(cx, sg, trg, &slot);
        if let Some(gate) = &gate {
            os.open_with(format!("if ({gate})"), 43);
        }
        for_each_incoming(os, sg, src.num_neurons(), trg.num_neurons(), 42, |os| {
            os.line(format!(
                "scalar dt = t - {}[ipre]{delay_term} - {shift};",
                field(src.name(), "sT")
            ));
            emit_weight_update(sg, os);
            Ok(())
        })?;
        if gate.is_some() {
            os.close(43);
        }
        os.close(41);
        os.close(40);
    }
    os.close(0);
    Ok(())
}
