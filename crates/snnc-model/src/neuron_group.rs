//! Neuron group descriptor.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::code::references_presynaptic;
use crate::delay::DelayRing;
use crate::model::SynapseGroupId;
use crate::models::NeuronModel;
use crate::{ModelError, Result};

/// External current injected into every neuron of a group each step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", content = "value", rename_all = "snake_case"))]
pub enum InputCurrent {
    /// No external input
    #[default]
    None,
    /// Same constant current for every neuron
    Constant(f64),
    /// Per-neuron array passed to the neuron step
    PerNeuron,
}

/// One population of identical neurons
#[derive(Debug, Clone)]
pub struct NeuronGroup {
    name: String,
    num_neurons: u32,
    model: Arc<NeuronModel>,
    params: Vec<f64>,
    derived_params: Option<Vec<f64>>,
    init_vals: Vec<f64>,

    in_syn: Vec<SynapseGroupId>,
    out_syn: Vec<SynapseGroupId>,

    need_spike_time: bool,
    need_true_spike: bool,
    need_spike_events: bool,
    need_queue: bool,
    var_need_queue: Vec<bool>,
    num_delay_slots: u32,
    spike_event_conditions: BTreeSet<(String, String)>,

    spike_zero_copy: bool,
    spike_event_zero_copy: bool,
    spike_time_zero_copy: bool,
    var_zero_copy: BTreeSet<String>,

    host_id: u32,
    device_id: u32,

    input: InputCurrent,
    offsets: Option<(u32, u32)>,
}

impl NeuronGroup {
    /// Create a group, checking parameter and initial-value counts against the model
    pub fn new(
        name: impl Into<String>,
        num_neurons: u32,
        model: Arc<NeuronModel>,
        params: Vec<f64>,
        init_vals: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if params.len() != model.params.len() {
            return Err(ModelError::ValueCount {
                group: name,
                model: model.name.clone(),
                what: "parameters",
                expected: model.params.len(),
                found: params.len(),
            });
        }
        if init_vals.len() != model.vars.len() {
            return Err(ModelError::ValueCount {
                group: name,
                model: model.name.clone(),
                what: "initial values",
                expected: model.vars.len(),
                found: init_vals.len(),
            });
        }
        if num_neurons == 0 {
            return Err(ModelError::invalid_parameter(
                format!("{name}.num_neurons"),
                "0",
                "> 0",
            ));
        }
        let num_vars = model.vars.len();
        Ok(Self {
            name,
            num_neurons,
            model,
            params,
            derived_params: None,
            init_vals,
            in_syn: Vec::new(),
            out_syn: Vec::new(),
            need_spike_time: false,
            need_true_spike: false,
            need_spike_events: false,
            need_queue: false,
            var_need_queue: vec![false; num_vars],
            num_delay_slots: 1,
            spike_event_conditions: BTreeSet::new(),
            spike_zero_copy: false,
            spike_event_zero_copy: false,
            spike_time_zero_copy: false,
            var_zero_copy: BTreeSet::new(),
            host_id: 0,
            device_id: 0,
            input: InputCurrent::None,
            offsets: None,
        })
    }

    /// Raise the delay-slot count to `required_delay + 1` if that is larger
    pub fn check_num_delay_slots(&mut self, required_delay: u32) {
        let needed = required_delay.saturating_add(1);
        if needed > self.num_delay_slots {
            log::debug!(
                "{}: delay slots {} -> {}",
                self.name,
                self.num_delay_slots,
                needed
            );
            self.num_delay_slots = needed;
        }
        if self.num_delay_slots > 1 {
            self.need_queue = true;
        }
    }

    /// Flag every variable `code` reads through `$(<var>_pre)`. Only ever sets flags.
    pub fn update_var_queues(&mut self, code: &str) {
        for (flag, var) in self.var_need_queue.iter_mut().zip(&self.model.vars) {
            if references_presynaptic(code, &var.name) {
                *flag = true;
            }
        }
    }

    /// Register a spike-event predicate under a namespace; returns false if already present
    pub fn add_spike_event_condition(
        &mut self,
        code: impl Into<String>,
        namespace: impl Into<String>,
    ) -> bool {
        self.spike_event_conditions
            .insert((code.into(), namespace.into()))
    }

    /// Attach an incoming synapse group; returns its position
    pub fn add_in_syn(&mut self, sg: SynapseGroupId) -> usize {
        self.in_syn.push(sg);
        self.in_syn.len() - 1
    }

    /// Attach an outgoing synapse group; returns its position
    pub fn add_out_syn(&mut self, sg: SynapseGroupId) -> usize {
        self.out_syn.push(sg);
        self.out_syn.len() - 1
    }

    /// Record this group's offsets and advance both running counters
    pub fn calc_sizes(&mut self, block_size: u32, cum_sum: &mut u32, padded_cum_sum: &mut u32) {
        let block = block_size.max(1);
        self.offsets = Some((*cum_sum, *padded_cum_sum));
        *cum_sum += self.num_neurons;
        *padded_cum_sum += self.num_neurons.div_ceil(block) * block;
    }

    /// Compute the derived parameters; fails if called twice
    pub fn init_derived_params(&mut self, dt: f64) -> Result<()> {
        if self.derived_params.is_some() {
            return Err(ModelError::DerivedParamsInitialized(self.name.clone()));
        }
        let values = self
            .model
            .derived_params
            .iter()
            .map(|d| d.evaluate(&self.params, dt))
            .collect();
        self.derived_params = Some(values);
        Ok(())
    }

    /// Mark spike times as needed
    pub fn set_spike_time_required(&mut self) {
        self.need_spike_time = true;
    }

    /// Mark true spikes as needed by a consumer
    pub fn set_true_spike_required(&mut self) {
        self.need_true_spike = true;
    }

    /// Mark spike events as needed
    pub fn set_spike_event_required(&mut self) {
        self.need_spike_events = true;
    }

    /// Request zero-copy placement of the spike buffers
    pub fn set_spike_zero_copy(&mut self, enabled: bool) {
        self.spike_zero_copy = enabled;
    }

    /// Request zero-copy placement of the spike-event buffers
    pub fn set_spike_event_zero_copy(&mut self, enabled: bool) {
        self.spike_event_zero_copy = enabled;
    }

    /// Request zero-copy placement of the spike-time buffer
    pub fn set_spike_time_zero_copy(&mut self, enabled: bool) {
        self.spike_time_zero_copy = enabled;
    }

    /// Request zero-copy placement of a named state variable
    pub fn set_var_zero_copy(&mut self, var: &str) -> Result<()> {
        if self.model.var_index(var).is_none() {
            return Err(ModelError::UnknownVariable {
                group: self.name.clone(),
                var: var.to_string(),
            });
        }
        self.var_zero_copy.insert(var.to_string());
        Ok(())
    }

    /// Place the group on a cluster host and device
    pub fn set_cluster_index(&mut self, host_id: u32, device_id: u32) {
        self.host_id = host_id;
        self.device_id = device_id;
    }

    /// Set the external input mode
    pub fn set_input(&mut self, input: InputCurrent) {
        self.input = input;
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Population size
    pub fn num_neurons(&self) -> u32 {
        self.num_neurons
    }

    /// Neuron model
    pub fn model(&self) -> &NeuronModel {
        &self.model
    }

    /// Raw parameter values
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Derived parameter values, empty until [`init_derived_params`](Self::init_derived_params)
    pub fn derived_params(&self) -> &[f64] {
        self.derived_params.as_deref().unwrap_or(&[])
    }

    /// True once derived parameters have been computed
    pub fn derived_params_initialized(&self) -> bool {
        self.derived_params.is_some()
    }

    /// Initial variable values
    pub fn init_vals(&self) -> &[f64] {
        &self.init_vals
    }

    /// Incoming synapse groups in attachment order
    pub fn in_syn(&self) -> &[SynapseGroupId] {
        &self.in_syn
    }

    /// Outgoing synapse groups in attachment order
    pub fn out_syn(&self) -> &[SynapseGroupId] {
        &self.out_syn
    }

    /// Spike times recorded
    pub fn needs_spike_time(&self) -> bool {
        self.need_spike_time
    }

    /// True spikes consumed by some synapse
    pub fn needs_true_spike(&self) -> bool {
        self.need_true_spike
    }

    /// Spike events detected
    pub fn needs_spike_events(&self) -> bool {
        self.need_spike_events
    }

    /// Spike or variable history kept in a ring
    pub fn needs_queue(&self) -> bool {
        self.need_queue
    }

    /// Per-variable queue flags, one per model variable
    pub fn var_need_queue(&self) -> &[bool] {
        &self.var_need_queue
    }

    /// Queue flag of the variable at `index`
    pub fn var_needs_queue(&self, index: usize) -> bool {
        self.var_need_queue.get(index).copied().unwrap_or(false)
    }

    /// True when some variable is queued
    pub fn any_var_needs_queue(&self) -> bool {
        self.var_need_queue.iter().any(|q| *q)
    }

    /// Resolved delay-slot count
    pub fn num_delay_slots(&self) -> u32 {
        self.num_delay_slots
    }

    /// Delay ring of this group
    pub fn delay_ring(&self) -> DelayRing {
        DelayRing::new(self.num_delay_slots)
    }

    /// True when emitted code must index a delay slot
    pub fn is_delay_required(&self) -> bool {
        self.num_delay_slots > 1
    }

    /// Spike-event predicates with their namespaces, in sorted order
    pub fn spike_event_conditions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.spike_event_conditions
            .iter()
            .map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Spike buffers zero-copy
    pub fn is_spike_zero_copy(&self) -> bool {
        self.spike_zero_copy
    }

    /// Spike-event buffers zero-copy
    pub fn is_spike_event_zero_copy(&self) -> bool {
        self.spike_event_zero_copy
    }

    /// Spike-time buffer zero-copy
    pub fn is_spike_time_zero_copy(&self) -> bool {
        self.spike_time_zero_copy
    }

    /// Named variable zero-copy
    pub fn is_var_zero_copy(&self, var: &str) -> bool {
        self.var_zero_copy.contains(var)
    }

    /// Any buffer of this group is zero-copy
    pub fn uses_zero_copy(&self) -> bool {
        self.spike_zero_copy
            || self.spike_event_zero_copy
            || self.spike_time_zero_copy
            || !self.var_zero_copy.is_empty()
    }

    /// Cluster host
    pub fn host_id(&self) -> u32 {
        self.host_id
    }

    /// Device on the host
    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// External input mode
    pub fn input(&self) -> InputCurrent {
        self.input
    }

    /// `(cumSum, paddedCumSum)` recorded by [`calc_sizes`](Self::calc_sizes)
    pub fn offsets(&self) -> Option<(u32, u32)> {
        self.offsets
    }

    /// Global neuron id range `[start, end)` once sizes are computed
    pub fn id_range(&self) -> Option<std::ops::Range<u32>> {
        self.offsets
            .map(|(start, _)| start..start + self.num_neurons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use proptest::prelude::*;

    fn izh(n: u32) -> NeuronGroup {
        NeuronGroup::new(
            "PN",
            n,
            Arc::new(builtin::izhikevich()),
            vec![0.02, 0.2, -65.0, 8.0],
            vec![-65.0, -13.0],
        )
        .unwrap()
    }

    #[test]
    fn value_counts_checked() {
        let err = NeuronGroup::new(
            "PN",
            10,
            Arc::new(builtin::izhikevich()),
            vec![0.02],
            vec![-65.0, -13.0],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ValueCount { what: "parameters", .. }));
    }

    #[test]
    fn delay_slots_monotonic() {
        let mut g = izh(10);
        assert_eq!(g.num_delay_slots(), 1);
        assert!(!g.needs_queue());
        g.check_num_delay_slots(0);
        assert_eq!(g.num_delay_slots(), 1);
        g.check_num_delay_slots(4);
        g.check_num_delay_slots(2);
        assert_eq!(g.num_delay_slots(), 5);
        assert!(g.needs_queue());
        assert!(g.is_delay_required());
    }

    #[test]
    fn var_queues_only_grow() {
        let mut g = izh(10);
        g.update_var_queues("$(g) * $(V_pre)");
        assert_eq!(g.var_need_queue(), &[true, false]);
        g.update_var_queues("$(g)");
        assert_eq!(g.var_need_queue(), &[true, false]);
        g.update_var_queues("$(U_pre)");
        assert_eq!(g.var_need_queue(), &[true, true]);
        assert!(g.any_var_needs_queue());
    }

    #[test]
    fn spike_event_conditions_are_a_set() {
        let mut g = izh(10);
        assert!(g.add_spike_event_condition("$(V_pre) > -40.0", "PNKC"));
        assert!(!g.add_spike_event_condition("$(V_pre) > -40.0", "PNKC"));
        assert!(g.add_spike_event_condition("$(V_pre) > -40.0", "PNLHI"));
        assert_eq!(g.spike_event_conditions().count(), 2);
    }

    #[test]
    fn calc_sizes_pads_to_block() {
        let mut a = izh(10);
        let mut b = izh(33);
        let (mut cum, mut padded) = (0, 0);
        a.calc_sizes(32, &mut cum, &mut padded);
        b.calc_sizes(32, &mut cum, &mut padded);
        assert_eq!(a.offsets(), Some((0, 0)));
        assert_eq!(b.offsets(), Some((10, 32)));
        assert_eq!((cum, padded), (43, 96));
        assert_eq!(b.id_range(), Some(10..43));
    }

    #[test]
    fn derived_params_once() {
        let mut g = NeuronGroup::new(
            "LIF",
            4,
            Arc::new(builtin::lif()),
            vec![0.25, 10.0, -65.0, -65.0, -50.0, 0.0, 2.0],
            vec![-65.0, 0.0],
        )
        .unwrap();
        assert!(g.derived_params().is_empty());
        g.init_derived_params(0.1).unwrap();
        let exp_tc = (-0.1f64 / 10.0).exp();
        assert!((g.derived_params()[0] - exp_tc).abs() < 1e-12);
        assert!((g.derived_params()[1] - 40.0).abs() < 1e-12);
        assert!(matches!(
            g.init_derived_params(0.1),
            Err(ModelError::DerivedParamsInitialized(_))
        ));
    }

    #[test]
    fn zero_copy_unknown_var_fails() {
        let mut g = izh(3);
        assert!(!g.uses_zero_copy());
        g.set_var_zero_copy("V").unwrap();
        assert!(g.is_var_zero_copy("V"));
        assert!(g.uses_zero_copy());
        assert!(g.set_var_zero_copy("W").is_err());
    }

    proptest! {
        #[test]
        fn delay_slots_equal_one_plus_max(delays in proptest::collection::vec(0u32..50, 0..12)) {
            let mut g = izh(2);
            for d in &delays {
                g.check_num_delay_slots(*d);
            }
            let expected = delays.iter().max().map(|m| m + 1).unwrap_or(1);
            prop_assert_eq!(g.num_delay_slots(), expected);
        }
    }
}
