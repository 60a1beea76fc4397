//! Per-population runtime state and the simulation context owning it.
//!
//! Every population keeps its spike lists in a delay ring of `slots`
//! snapshots. At the start of a step the pointer advances and the new
//! current slot is cleared; spikes registered during the step land there and
//! stay readable for `slots - 1` further steps.

use snnc_model::{DelayRing, ModelSpec, NeuronGroup, NeuronGroupId, SpikeKind};

use crate::error::{Result, RuntimeError};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Spike time every neuron starts with, far enough in the past to never pair
pub const INITIAL_SPIKE_TIME: f64 = -10.0;

/// Ring of spike lists, one count and one `n`-wide index block per slot
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeQueue {
    counts: Vec<u32>,
    entries: Vec<u32>,
    width: usize,
}

impl SpikeQueue {
    fn new(slots: u32, width: u32) -> Self {
        let width = width as usize;
        Self {
            counts: vec![0; slots as usize],
            entries: vec![0; slots as usize * width],
            width,
        }
    }

    /// Indices registered in `slot`
    pub fn slot(&self, slot: u32) -> &[u32] {
        let slot = slot as usize;
        let start = slot * self.width;
        &self.entries[start..start + self.counts[slot] as usize]
    }

    fn clear(&mut self, slot: u32) {
        self.counts[slot as usize] = 0;
    }

    fn clear_all(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    fn push(&mut self, slot: u32, neuron: u32) -> bool {
        let slot = slot as usize;
        let count = self.counts[slot] as usize;
        if count >= self.width {
            return false;
        }
        self.entries[slot * self.width + count] = neuron;
        self.counts[slot] += 1;
        true
    }
}

/// Host-side state of one neuron population
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationState {
    id: NeuronGroupId,
    name: String,
    num_neurons: u32,
    host_id: u32,
    ring: DelayRing,
    que_ptr: u32,
    spikes: SpikeQueue,
    events: Option<SpikeQueue>,
    spike_times: Option<Vec<f64>>,
    var_names: Vec<String>,
    vars: Vec<Vec<f64>>,
    init_vals: Vec<f64>,
}

impl PopulationState {
    /// State sized from a declared group, variables at their initial values
    pub fn from_group(id: NeuronGroupId, ng: &NeuronGroup) -> Self {
        let ring = ng.delay_ring();
        let n = ng.num_neurons();
        let vars = (0..ng.model().vars.len())
            .map(|i| {
                let len = if ng.var_needs_queue(i) {
                    ring.slots() as usize * n as usize
                } else {
                    n as usize
                };
                vec![ng.init_vals()[i]; len]
            })
            .collect();
        Self {
            id,
            name: ng.name().to_string(),
            num_neurons: n,
            host_id: ng.host_id(),
            ring,
            que_ptr: 0,
            spikes: SpikeQueue::new(ring.slots(), n),
            events: ng
                .needs_spike_events()
                .then(|| SpikeQueue::new(ring.slots(), n)),
            spike_times: ng
                .needs_spike_time()
                .then(|| vec![INITIAL_SPIKE_TIME; n as usize]),
            var_names: ng.model().vars.iter().map(|v| v.name.clone()).collect(),
            vars,
            init_vals: ng.init_vals().to_vec(),
        }
    }

    /// Handle of the group in the model arena
    pub fn id(&self) -> NeuronGroupId {
        self.id
    }

    /// Population name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of neurons
    pub fn num_neurons(&self) -> u32 {
        self.num_neurons
    }

    /// Host owning the population
    pub fn host_id(&self) -> u32 {
        self.host_id
    }

    /// Delay ring of the spike lists
    pub fn ring(&self) -> DelayRing {
        self.ring
    }

    /// Current slot pointer
    pub fn que_ptr(&self) -> u32 {
        self.que_ptr
    }

    /// True when spike events are tracked
    pub fn has_events(&self) -> bool {
        self.events.is_some()
    }

    fn queue(&self, kind: SpikeKind) -> Result<&SpikeQueue> {
        match kind {
            SpikeKind::True => Ok(&self.spikes),
            SpikeKind::Event => self.events.as_ref().ok_or_else(|| {
                RuntimeError::invalid_config(format!(
                    "population '{}' does not track spike events",
                    self.name
                ))
            }),
        }
    }

    fn queue_mut(&mut self, kind: SpikeKind) -> Result<&mut SpikeQueue> {
        match kind {
            SpikeKind::True => Ok(&mut self.spikes),
            SpikeKind::Event => {
                let name = &self.name;
                self.events.as_mut().ok_or_else(|| {
                    RuntimeError::invalid_config(format!(
                        "population '{name}' does not track spike events"
                    ))
                })
            }
        }
    }

    /// Move the pointer to the next slot and clear it
    pub fn advance(&mut self) {
        self.que_ptr = self.ring.advance(self.que_ptr);
        self.spikes.clear(self.que_ptr);
        if let Some(events) = self.events.as_mut() {
            events.clear(self.que_ptr);
        }
    }

    /// Register a spike of `kind` for `neuron` in the current slot.
    ///
    /// True spikes also stamp the neuron's spike time when those are tracked.
    pub fn record(&mut self, kind: SpikeKind, neuron: u32, t: f64) -> Result<()> {
        if neuron >= self.num_neurons {
            return Err(RuntimeError::invalid_parameter(
                format!("{}.neuron", self.name),
                neuron.to_string(),
                format!("< {}", self.num_neurons),
            ));
        }
        let slot = self.que_ptr;
        if !self.queue_mut(kind)?.push(slot, neuron) {
            return Err(RuntimeError::invalid_config(format!(
                "population '{}' registered more than {} spikes in one step",
                self.name, self.num_neurons
            )));
        }
        if kind == SpikeKind::True {
            if let Some(times) = self.spike_times.as_mut() {
                times[neuron as usize] = t;
            }
        }
        Ok(())
    }

    /// Spikes of `kind` registered this step
    pub fn current_spikes(&self, kind: SpikeKind) -> Result<&[u32]> {
        Ok(self.queue(kind)?.slot(self.que_ptr))
    }

    /// Spikes a consumer with `delay_steps` propagation delay reads this step
    pub fn delayed_spikes(&self, kind: SpikeKind, delay_steps: u32) -> Result<&[u32]> {
        if delay_steps >= self.ring.slots() {
            return Err(RuntimeError::invalid_parameter(
                format!("{}.delay_steps", self.name),
                delay_steps.to_string(),
                format!("< {}", self.ring.slots()),
            ));
        }
        let slot = self
            .ring
            .read_slot(self.que_ptr, snnc_model::delay::effective_delay(delay_steps));
        Ok(self.queue(kind)?.slot(slot))
    }

    /// Whole count and index buffers of `kind`, every ring slot included
    pub fn spike_buffers(&self, kind: SpikeKind) -> Result<(&[u32], &[u32])> {
        let queue = self.queue(kind)?;
        Ok((&queue.counts, &queue.entries))
    }

    /// Overwrite the whole ring of `kind` with buffers received from the owning host
    pub fn restore_spike_buffers(
        &mut self,
        kind: SpikeKind,
        counts: &[u32],
        entries: &[u32],
    ) -> Result<()> {
        let n = self.num_neurons;
        let name = self.name.clone();
        let queue = self.queue_mut(kind)?;
        if counts.len() != queue.counts.len() || entries.len() != queue.entries.len() {
            return Err(RuntimeError::invalid_parameter(
                format!("{name}.spike_buffers"),
                format!("{} counts, {} entries", counts.len(), entries.len()),
                format!("{} counts, {} entries", queue.counts.len(), queue.entries.len()),
            ));
        }
        for (slot, &count) in counts.iter().enumerate() {
            if count > n {
                return Err(RuntimeError::invalid_parameter(
                    format!("{name}.spike_count"),
                    count.to_string(),
                    format!("<= {n}"),
                ));
            }
            let start = slot * queue.width;
            let used = &entries[start..start + count as usize];
            if let Some(&bad) = used.iter().find(|&&i| i >= n) {
                return Err(RuntimeError::invalid_parameter(
                    format!("{name}.neuron"),
                    bad.to_string(),
                    format!("< {n}"),
                ));
            }
        }
        queue.counts.copy_from_slice(counts);
        queue.entries.copy_from_slice(entries);
        Ok(())
    }

    /// Last true-spike time of every neuron, when tracked
    pub fn spike_times(&self) -> Option<&[f64]> {
        self.spike_times.as_deref()
    }

    /// Values of a state variable
    pub fn var(&self, name: &str) -> Option<&[f64]> {
        self.var_names
            .iter()
            .position(|v| v == name)
            .map(|i| self.vars[i].as_slice())
    }

    /// Mutable values of a state variable
    pub fn var_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        let i = self.var_names.iter().position(|v| v == name)?;
        Some(self.vars[i].as_mut_slice())
    }

    /// Back to the state right after allocation
    pub fn reset(&mut self) {
        self.que_ptr = 0;
        self.spikes.clear_all();
        if let Some(events) = self.events.as_mut() {
            events.clear_all();
        }
        if let Some(times) = self.spike_times.as_mut() {
            times.iter_mut().for_each(|t| *t = INITIAL_SPIKE_TIME);
        }
        for (values, init) in self.vars.iter_mut().zip(&self.init_vals) {
            values.iter_mut().for_each(|v| *v = *init);
        }
    }
}

/// All population state of one host, passed explicitly to every step
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationContext {
    host_id: u32,
    dt: f64,
    t: f64,
    step: u64,
    populations: Vec<PopulationState>,
}

impl SimulationContext {
    /// Context for `host_id`, holding state for every population in arena order.
    ///
    /// Remote populations are kept too: their current slot is filled by the
    /// spike exchange.
    pub fn from_model(model: &ModelSpec, host_id: u32) -> Result<Self> {
        if !model.host_ids().contains(&host_id) {
            return Err(RuntimeError::invalid_config(format!(
                "model '{}' places nothing on host {host_id}",
                model.name()
            )));
        }
        if !model.is_finalized() {
            log::warn!(
                "model '{}' is not finalized; delay rings may be undersized",
                model.name()
            );
        }
        let populations: Vec<PopulationState> = model
            .neuron_groups()
            .map(|(id, ng)| PopulationState::from_group(id, ng))
            .collect();
        log::debug!(
            "host {host_id}: context for '{}' with {} populations",
            model.name(),
            populations.len()
        );
        Ok(Self {
            host_id,
            dt: model.dt(),
            t: 0.0,
            step: 0,
            populations,
        })
    }

    /// Host this context simulates
    pub fn host_id(&self) -> u32 {
        self.host_id
    }

    /// Simulation time at the start of the current step
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Completed steps
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Every population, in arena order
    pub fn populations(&self) -> &[PopulationState] {
        &self.populations
    }

    /// State of a population
    pub fn population(&self, id: NeuronGroupId) -> Result<&PopulationState> {
        self.populations
            .get(id.0)
            .ok_or_else(|| RuntimeError::PopulationNotFound {
                name: id.to_string(),
            })
    }

    /// Mutable state of a population
    pub fn population_mut(&mut self, id: NeuronGroupId) -> Result<&mut PopulationState> {
        self.populations
            .get_mut(id.0)
            .ok_or_else(|| RuntimeError::PopulationNotFound {
                name: id.to_string(),
            })
    }

    /// State of a population by name
    pub fn population_by_name(&self, name: &str) -> Result<&PopulationState> {
        self.populations
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| RuntimeError::PopulationNotFound {
                name: name.to_string(),
            })
    }

    /// Advance every ring pointer; spikes registered afterwards belong to this step
    pub fn begin_step(&mut self) {
        #[cfg(feature = "parallel")]
        self.populations.par_iter_mut().for_each(PopulationState::advance);

        #[cfg(not(feature = "parallel"))]
        self.populations.iter_mut().for_each(PopulationState::advance);
    }

    /// Close the step and move time forward by one `dt`
    pub fn finish_step(&mut self) {
        self.step += 1;
        self.t = self.step as f64 * self.dt;
    }

    /// Rewind to time zero with every population freshly initialised
    pub fn reset(&mut self) {
        #[cfg(feature = "parallel")]
        self.populations.par_iter_mut().for_each(PopulationState::reset);

        #[cfg(not(feature = "parallel"))]
        self.populations.iter_mut().for_each(PopulationState::reset);

        self.t = 0.0;
        self.step = 0;
    }
}
