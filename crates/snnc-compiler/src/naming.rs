//! Names and index expressions of generated state.
//!
//! All simulation state lives in `SimContext`; a population `PN` is reached
//! as `ctx->PN.<field>`. A delayed population indexes its spike lists and
//! queued variables by slot; an undelayed one uses flat buffers and never
//! mentions a slot.

pub use snnc_model::SpikeKind;
use snnc_model::{DelayRing, NeuronGroup};

/// Count array field of a spike list
pub fn count_field(kind: SpikeKind) -> &'static str {
    match kind {
        SpikeKind::True => "glbSpkCnt",
        SpikeKind::Event => "glbSpkCntEvnt",
    }
}

/// Index array field of a spike list
pub fn list_field(kind: SpikeKind) -> &'static str {
    match kind {
        SpikeKind::True => "glbSpk",
        SpikeKind::Event => "glbSpkEvnt",
    }
}

/// `ctx-><owner>.<field>`
pub fn field(owner: &str, field: &str) -> String {
    format!("ctx->{owner}.{field}")
}

/// Struct type holding a group's state
pub fn state_type(owner: &str) -> String {
    format!("{owner}State")
}

/// Current-slot pointer of a population
pub fn que_ptr(ng: &NeuronGroup) -> String {
    field(ng.name(), "spkQuePtr")
}

/// Slot a consumer with effective delay `delay` reads: `(ptr + S - d + 1) % S`
pub fn read_slot_expr(ng: &NeuronGroup, delay: u32) -> String {
    let ring = ng.delay_ring();
    format!(
        "({} + {}) % {}",
        que_ptr(ng),
        ring.read_offset(delay),
        ring.slots()
    )
}

/// Previous-step slot `(ptr + S - 1) % S`
pub fn previous_slot_expr(ng: &NeuronGroup) -> String {
    let ring = ng.delay_ring();
    format!("({} + {}) % {}", que_ptr(ng), ring.slots() - 1, ring.slots())
}

/// Indexing of one ring slot: the count subscript and the element offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotIndex {
    count: String,
    offset: Option<String>,
}

impl SlotIndex {
    /// Undelayed population: count `[0]`, elements unoffset
    pub fn flat() -> Self {
        Self {
            count: "0".to_string(),
            offset: None,
        }
    }

    /// Slot held in `slot_var` of a population of `n` neurons
    pub fn at(slot_var: &str, n: u32) -> Self {
        Self {
            count: slot_var.to_string(),
            offset: Some(format!("{slot_var} * {n}")),
        }
    }

    /// Pick [`flat`](Self::flat) or [`at`](Self::at) depending on the ring
    pub fn for_ring(ring: DelayRing, slot_var: &str, n: u32) -> Self {
        if ring.is_delayed() {
            Self::at(slot_var, n)
        } else {
            Self::flat()
        }
    }

    /// Count subscript
    pub fn count(&self) -> &str {
        &self.count
    }

    /// Element subscript for neuron or list position `idx`
    pub fn element(&self, idx: &str) -> String {
        match &self.offset {
            Some(off) => format!("({off}) + {idx}"),
            None => idx.to_string(),
        }
    }

    /// Element offset variable initialiser, `None` when flat
    pub fn offset(&self) -> Option<&str> {
        self.offset.as_deref()
    }
}

/// Spike count at a slot
pub fn spike_count(ng: &NeuronGroup, kind: SpikeKind, slot: &SlotIndex) -> String {
    format!("{}[{}]", field(ng.name(), count_field(kind)), slot.count())
}

/// Spike list entry `pos` at a slot
pub fn spike_entry(ng: &NeuronGroup, kind: SpikeKind, slot: &SlotIndex, pos: &str) -> String {
    format!("{}[{}]", field(ng.name(), list_field(kind)), slot.element(pos))
}

/// True when variable `index` of `ng` is stored per slot
pub fn var_is_queued(ng: &NeuronGroup, index: usize) -> bool {
    ng.is_delay_required() && ng.var_needs_queue(index)
}

/// Elements in a spike count array
pub fn spike_count_len(ng: &NeuronGroup) -> u32 {
    ng.num_delay_slots()
}

/// Elements in a spike index array
pub fn spike_list_len(ng: &NeuronGroup) -> u64 {
    u64::from(ng.num_neurons()) * u64::from(ng.num_delay_slots())
}

/// Elements in the storage of variable `index`
pub fn var_len(ng: &NeuronGroup, index: usize) -> u64 {
    if var_is_queued(ng, index) {
        spike_list_len(ng)
    } else {
        u64::from(ng.num_neurons())
    }
}

/// Local name of the `j`-th incoming accumulator of a target, `inSyn<target><j>`
pub fn in_syn_local(target: &str, j: usize) -> String {
    format!("inSyn{target}{j}")
}

/// Name of an extra global parameter argument, `<name><population>`
pub fn extra_global_arg(name: &str, pop: &str) -> String {
    format!("{name}{pop}")
}

/// Name of a per-neuron input current argument
pub fn input_arg(pop: &str) -> String {
    format!("inputI{pop}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use snnc_model::builtin;
    use std::sync::Arc;

    fn group(slots: u32) -> NeuronGroup {
        let mut g = NeuronGroup::new(
            "PN",
            100,
            Arc::new(builtin::izhikevich()),
            vec![0.02, 0.2, -65.0, 8.0],
            vec![-65.0, -13.0],
        )
        .unwrap();
        g.check_num_delay_slots(slots - 1);
        g
    }

    #[test]
    fn read_slot_uses_ring_offset() {
        let g = group(4);
        assert_eq!(read_slot_expr(&g, 4), "(ctx->PN.spkQuePtr + 1) % 4");
        assert_eq!(read_slot_expr(&g, 1), "(ctx->PN.spkQuePtr + 0) % 4");
        assert_eq!(previous_slot_expr(&g), "(ctx->PN.spkQuePtr + 3) % 4");
    }

    #[test]
    fn flat_population_has_no_slot() {
        let g = group(1);
        let slot = SlotIndex::for_ring(g.delay_ring(), "preReadDelaySlot", 100);
        assert_eq!(spike_count(&g, SpikeKind::True, &slot), "ctx->PN.glbSpkCnt[0]");
        assert_eq!(spike_entry(&g, SpikeKind::True, &slot, "i"), "ctx->PN.glbSpk[i]");
        assert!(!spike_count(&g, SpikeKind::True, &slot).contains("spkQuePtr"));
    }

    #[test]
    fn delayed_population_offsets_elements() {
        let g = group(3);
        let slot = SlotIndex::for_ring(g.delay_ring(), "slot", 100);
        assert_eq!(spike_count(&g, SpikeKind::Event, &slot), "ctx->PN.glbSpkCntEvnt[slot]");
        assert_eq!(spike_entry(&g, SpikeKind::Event, &slot, "i"), "ctx->PN.glbSpkEvnt[(slot * 100) + i]");
        assert_eq!(spike_list_len(&g), 300);
    }
}
