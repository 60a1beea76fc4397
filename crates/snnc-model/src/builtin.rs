//! Built-in neuron, postsynaptic and weight update models.
//!
//! Parameter order matters: groups supply values positionally.

use crate::models::{NeuronModel, PostsynapticModel, WeightUpdateModel};

/// Izhikevich neuron. Params `a, b, c, d`; vars `V, U`.
pub fn izhikevich() -> NeuronModel {
    NeuronModel::new("Izhikevich")
        .with_vars(&[("V", "scalar"), ("U", "scalar")])
        .with_params(&["a", "b", "c", "d"])
        .with_sim_code(
            "if ($(V) >= 30.0) {\n\
             \x20   $(V) = $(c);\n\
             \x20   $(U) += $(d);\n\
             }\n\
             $(V) += 0.5 * (0.04 * $(V) * $(V) + 5.0 * $(V) + 140.0 - $(U) + $(Isyn)) * $(DT);\n\
             $(V) += 0.5 * (0.04 * $(V) * $(V) + 5.0 * $(V) + 140.0 - $(U) + $(Isyn)) * $(DT);\n\
             $(U) += $(a) * ($(b) * $(V) - $(U)) * $(DT);",
        )
        .with_threshold("$(V) >= 29.99")
}

/// Poisson spike generator driven by an external rate table.
///
/// Params `therate, trefract, Vspike, Vrest`; vars `V, seed, spikeTime`;
/// extra globals `rates` (per-neuron thresholds) and `offset` (row into the table).
pub fn poisson() -> NeuronModel {
    NeuronModel::new("Poisson")
        .with_vars(&[("V", "scalar"), ("seed", "uint64_t"), ("spikeTime", "scalar")])
        .with_params(&["therate", "trefract", "Vspike", "Vrest"])
        .with_sim_code(
            "uint64_t theRnd;\n\
             if ($(V) > $(Vrest)) {\n\
             \x20   $(V) = $(Vrest);\n\
             }\n\
             else if ($(t) - $(spikeTime) > ($(trefract))) {\n\
             \x20   MYRAND($(seed), theRnd);\n\
             \x20   if (theRnd < *($(rates) + $(offset) + $(id))) {\n\
             \x20       $(V) = $(Vspike);\n\
             \x20       $(spikeTime) = $(t);\n\
             \x20   }\n\
             }",
        )
        .with_threshold("$(V) >= $(Vspike)")
        .with_extra_globals(&[("rates", "uint64_t *"), ("offset", "unsigned int")])
}

/// Leaky integrate-and-fire neuron with refractoriness.
///
/// Params `C, TauM, Vrest, Vreset, Vthresh, Ioffset, TauRefrac`; vars `V, RefracTime`.
pub fn lif() -> NeuronModel {
    NeuronModel::new("LIF")
        .with_vars(&[("V", "scalar"), ("RefracTime", "scalar")])
        .with_params(&["C", "TauM", "Vrest", "Vreset", "Vthresh", "Ioffset", "TauRefrac"])
        .with_derived("ExpTC", |p, dt| (-dt / p[1]).exp())
        .with_derived("Rmembrane", |p, _| p[1] / p[0])
        .with_sim_code(
            "if ($(RefracTime) <= 0.0) {\n\
             \x20   scalar alpha = (($(Isyn) + $(Ioffset)) * $(Rmembrane)) + $(Vrest);\n\
             \x20   $(V) = alpha - ($(ExpTC) * (alpha - $(V)));\n\
             }\n\
             else {\n\
             \x20   $(RefracTime) -= $(DT);\n\
             }",
        )
        .with_threshold("$(RefracTime) <= 0.0 && $(V) >= $(Vthresh)")
        .with_reset("$(V) = $(Vreset);\n$(RefracTime) = $(TauRefrac);")
}

/// Passive source whose spikes are injected from the host. No threshold.
pub fn spike_source() -> NeuronModel {
    NeuronModel::new("SpikeSource")
}

/// Plain current source: `x` follows the summed synaptic input
pub fn current_relay() -> NeuronModel {
    NeuronModel::new("CurrentRelay")
        .with_vars(&[("x", "scalar")])
        .with_sim_code("$(x) = $(Isyn);")
}

/// Input applied directly, accumulator cleared every step
pub fn delta_curr() -> PostsynapticModel {
    PostsynapticModel::new("DeltaCurr")
        .with_apply_input("$(inSyn)")
        .with_decay("$(inSyn) = 0;")
}

/// Exponentially decaying conductance. Params `tau, E`.
pub fn exp_cond() -> PostsynapticModel {
    PostsynapticModel::new("ExpCond")
        .with_params(&["tau", "E"])
        .with_derived("expDecay", |p, dt| (-dt / p[0]).exp())
        .with_apply_input("$(inSyn) * ($(E) - $(V))")
        .with_decay("$(inSyn) *= $(expDecay);")
}

/// Exponentially decaying current. Params `tau`.
pub fn exp_curr() -> PostsynapticModel {
    PostsynapticModel::new("ExpCurr")
        .with_params(&["tau"])
        .with_derived("expDecay", |p, dt| (-dt / p[0]).exp())
        .with_derived("init", |p, dt| p[0] * (1.0 - (-dt / p[0]).exp()) / dt)
        .with_apply_input("$(init) * $(inSyn)")
        .with_decay("$(inSyn) *= $(expDecay);")
}

/// Adds the weight on every presynaptic true spike
pub fn static_pulse() -> WeightUpdateModel {
    WeightUpdateModel::new("StaticPulse").with_input("$(g)")
}

/// Graded transmission while the presynaptic potential exceeds `Epre`.
///
/// Params `Epre, Vslope`.
pub fn graded() -> WeightUpdateModel {
    WeightUpdateModel::new("Graded")
        .with_params(&["Epre", "Vslope"])
        .with_input("$(g) * tanh(($(V_pre) - ($(Epre))) / ($(Vslope)))")
        .with_event_threshold("$(V_pre) > $(Epre)")
}

/// Pulse on presynaptic events above `Epre`, with piecewise learning. Params `Epre`.
pub fn learn1() -> WeightUpdateModel {
    WeightUpdateModel::new("Learn1")
        .with_params(&["Epre"])
        .with_input("$(g)")
        .with_event_threshold("$(V_pre) > $(Epre)")
        .learning()
}

/// Look up a neuron model by name
pub fn neuron_model(name: &str) -> Option<NeuronModel> {
    match name {
        "izhikevich" | "Izhikevich" => Some(izhikevich()),
        "poisson" | "Poisson" => Some(poisson()),
        "lif" | "LIF" => Some(lif()),
        "spike_source" | "SpikeSource" => Some(spike_source()),
        "current_relay" | "CurrentRelay" => Some(current_relay()),
        _ => None,
    }
}

/// Look up a postsynaptic model by name
pub fn postsynaptic_model(name: &str) -> Option<PostsynapticModel> {
    match name {
        "delta_curr" | "DeltaCurr" => Some(delta_curr()),
        "exp_cond" | "ExpCond" => Some(exp_cond()),
        "exp_curr" | "ExpCurr" => Some(exp_curr()),
        _ => None,
    }
}

/// Look up a weight update model by name
pub fn weight_update_model(name: &str) -> Option<WeightUpdateModel> {
    match name {
        "static_pulse" | "StaticPulse" => Some(static_pulse()),
        "graded" | "Graded" => Some(graded()),
        "learn1" | "Learn1" => Some(learn1()),
        _ => None,
    }
}
