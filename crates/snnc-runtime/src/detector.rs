//! Threshold edge detection.
//!
//! A true spike is registered when the threshold predicate holds after the
//! update but did not hold before it. A neuron staying above threshold for
//! several steps spikes once.

use snnc_model::SpikeKind;

use crate::error::{Result, RuntimeError};
use crate::state::PopulationState;

/// `predicate && !old_spike`
pub fn is_true_spike(old_spike: bool, predicate: bool) -> bool {
    predicate && !old_spike
}

/// Edge detector for a single neuron
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpikeEdgeDetector {
    old_spike: bool,
}

impl SpikeEdgeDetector {
    /// Detector with the predicate initially false
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the predicate evaluated after this step's update.
    ///
    /// The previous observation stands in for the pre-update predicate.
    pub fn observe(&mut self, predicate: bool) -> bool {
        let spiked = is_true_spike(self.old_spike, predicate);
        self.old_spike = predicate;
        spiked
    }

    /// Predicate value carried into the next step
    pub fn old_spike(&self) -> bool {
        self.old_spike
    }

    /// Forget the carried predicate
    pub fn reset(&mut self) {
        self.old_spike = false;
    }
}

/// Steps at which a predicate history produces a true spike
pub fn rising_edges<I>(history: I) -> Vec<usize>
where
    I: IntoIterator<Item = bool>,
{
    let mut detector = SpikeEdgeDetector::new();
    history
        .into_iter()
        .enumerate()
        .filter_map(|(step, p)| detector.observe(p).then_some(step))
        .collect()
}

/// One detector per neuron of a population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationDetector {
    neurons: Vec<SpikeEdgeDetector>,
}

impl PopulationDetector {
    /// Detectors for `num_neurons` neurons
    pub fn new(num_neurons: u32) -> Self {
        Self {
            neurons: vec![SpikeEdgeDetector::new(); num_neurons as usize],
        }
    }

    /// Indices of the neurons whose predicate rose this step
    pub fn detect(&mut self, predicates: &[bool]) -> Result<Vec<u32>> {
        if predicates.len() != self.neurons.len() {
            return Err(RuntimeError::invalid_parameter(
                "predicates.len",
                predicates.len().to_string(),
                format!("== {}", self.neurons.len()),
            ));
        }
        Ok(self
            .neurons
            .iter_mut()
            .zip(predicates)
            .enumerate()
            .filter_map(|(i, (d, &p))| d.observe(p).then_some(i as u32))
            .collect())
    }

    /// Detect and register the resulting true spikes in `state` at time `t`
    pub fn detect_into(
        &mut self,
        predicates: &[bool],
        state: &mut PopulationState,
        t: f64,
    ) -> Result<usize> {
        let spikes = self.detect(predicates)?;
        for &i in &spikes {
            state.record(SpikeKind::True, i, t)?;
        }
        Ok(spikes.len())
    }

    /// Forget every carried predicate
    pub fn reset(&mut self) {
        self.neurons.iter_mut().for_each(SpikeEdgeDetector::reset);
    }
}
