//! Synapse group descriptor and the piecewise learning rule.

use std::sync::Arc;

use crate::model::NeuronGroupId;
use crate::models::{PostsynapticModel, WeightUpdateModel};
use crate::{ModelError, Result};

/// How the set of active connections is represented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Connectivity {
    /// Every source connects to every target
    #[default]
    Dense,
    /// Compressed rows (`indInG` / `ind`)
    Sparse,
    /// Dense index space gated by one bit per connection
    Bitmask,
}

impl Connectivity {
    /// Short lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Connectivity::Dense => "dense",
            Connectivity::Sparse => "sparse",
            Connectivity::Bitmask => "bitmask",
        }
    }
}

/// Where the weight of a connection comes from
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value", rename_all = "snake_case"))]
pub enum WeightStorage {
    /// One constant for the whole group
    Global(f64),
    /// One stored value per connection
    #[default]
    Individual,
    /// Expression evaluated per connection; may use `$(id_pre)`, `$(id_post)`, `$(t)` and params
    Computed(String),
}

/// Branch taken by the piecewise rule, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LearningBranch {
    /// `dt > k1`
    LargePositive = 1,
    /// `k2 < dt <= k1`
    SmallPositive = 2,
    /// `k3 < dt <= k2`
    LessNegative = 3,
    /// `dt <= k3`
    MostNegative = 4,
}

/// Parameters of the four-branch spike-timing learning rule and its weight function
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiecewiseRule {
    /// Shift subtracted from the spike-time difference
    pub t_shift: f64,
    /// Upper knot
    pub k1: f64,
    /// Middle knot
    pub k2: f64,
    /// Lower knot
    pub k3: f64,
    /// Depression applied above `k1`
    pub depress_max: f64,
    /// Slope of the second branch
    pub slope_pos: f64,
    /// Slope of the third branch
    pub slope_neg: f64,
    /// Offset shared by the two linear branches
    pub offset: f64,
    /// Depression applied at or below `k3`
    pub depress_min: f64,
    /// Midpoint of the weight function
    pub g_mid: f64,
    /// Slope of the weight function
    pub g_slope: f64,
    /// Maximum weight
    pub g_max: f64,
}

impl PiecewiseRule {
    /// Check knot ordering and weight-function parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.k1 > self.k2 && self.k2 > self.k3) {
            return Err(ModelError::invalid_parameter(
                "learning.knots",
                format!("k1={} k2={} k3={}", self.k1, self.k2, self.k3),
                "k1 > k2 > k3",
            ));
        }
        if self.g_max <= 0.0 {
            return Err(ModelError::invalid_parameter(
                "learning.g_max",
                self.g_max.to_string(),
                "> 0",
            ));
        }
        Ok(())
    }

    /// Branch selected for a (shifted) spike-time difference
    pub fn branch(&self, dt: f64) -> LearningBranch {
        if dt > self.k1 {
            LearningBranch::LargePositive
        } else if dt > self.k2 {
            LearningBranch::SmallPositive
        } else if dt > self.k3 {
            LearningBranch::LessNegative
        } else {
            LearningBranch::MostNegative
        }
    }

    /// Raw-weight change for a (shifted) spike-time difference
    pub fn delta(&self, dt: f64) -> f64 {
        match self.branch(dt) {
            LearningBranch::LargePositive => -self.depress_max,
            LearningBranch::SmallPositive => self.slope_pos * dt + self.offset,
            LearningBranch::LessNegative => self.slope_neg * dt + self.offset,
            LearningBranch::MostNegative => -self.depress_min,
        }
    }

    /// Saturating map from raw to effective weight
    pub fn g_func(&self, raw: f64) -> f64 {
        self.g_max / 2.0 * ((self.g_slope * (raw - self.g_mid)).tanh() + 1.0)
    }
}

/// One projection between two neuron groups
#[derive(Debug, Clone)]
pub struct SynapseGroup {
    pub(crate) name: String,
    pub(crate) connectivity: Connectivity,
    pub(crate) weights: WeightStorage,
    pub(crate) wu_model: Arc<WeightUpdateModel>,
    pub(crate) wu_params: Vec<f64>,
    pub(crate) wu_derived: Option<Vec<f64>>,
    pub(crate) ps_model: Arc<PostsynapticModel>,
    pub(crate) ps_params: Vec<f64>,
    pub(crate) ps_derived: Option<Vec<f64>>,
    pub(crate) ps_init_vals: Vec<f64>,
    pub(crate) delay_steps: u32,
    pub(crate) src: NeuronGroupId,
    pub(crate) trg: NeuronGroupId,
    pub(crate) target_input_index: usize,
    pub(crate) host_id: u32,
    pub(crate) learning: Option<PiecewiseRule>,
    pub(crate) event_condition: Option<String>,
}

impl SynapseGroup {
    /// Compute the weight-update and postsynaptic derived parameters; fails if called twice
    pub fn init_derived_params(&mut self, dt: f64) -> Result<()> {
        if self.wu_derived.is_some() || self.ps_derived.is_some() {
            return Err(ModelError::DerivedParamsInitialized(self.name.clone()));
        }
        self.wu_derived = Some(
            self.wu_model
                .derived_params
                .iter()
                .map(|d| d.evaluate(&self.wu_params, dt))
                .collect(),
        );
        self.ps_derived = Some(
            self.ps_model
                .derived_params
                .iter()
                .map(|d| d.evaluate(&self.ps_params, dt))
                .collect(),
        );
        Ok(())
    }

    /// True once derived parameters have been computed
    pub fn derived_params_initialized(&self) -> bool {
        self.wu_derived.is_some()
    }

    /// Store the event predicate with this group's parameters already bound
    pub fn set_event_condition(&mut self, code: impl Into<String>) {
        self.event_condition = Some(code.into());
    }

    /// Place the group on a cluster host
    pub fn set_host_id(&mut self, host_id: u32) {
        self.host_id = host_id;
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connectivity representation
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Weight storage mode
    pub fn weights(&self) -> &WeightStorage {
        &self.weights
    }

    /// Weight update model
    pub fn wu_model(&self) -> &WeightUpdateModel {
        &self.wu_model
    }

    /// Weight update parameter values
    pub fn wu_params(&self) -> &[f64] {
        &self.wu_params
    }

    /// Weight update derived values (empty until initialised)
    pub fn wu_derived_params(&self) -> &[f64] {
        self.wu_derived.as_deref().unwrap_or(&[])
    }

    /// Postsynaptic model
    pub fn ps_model(&self) -> &PostsynapticModel {
        &self.ps_model
    }

    /// Postsynaptic parameter values
    pub fn ps_params(&self) -> &[f64] {
        &self.ps_params
    }

    /// Postsynaptic derived values (empty until initialised)
    pub fn ps_derived_params(&self) -> &[f64] {
        self.ps_derived.as_deref().unwrap_or(&[])
    }

    /// Postsynaptic state initial values
    pub fn ps_init_vals(&self) -> &[f64] {
        &self.ps_init_vals
    }

    /// Declared propagation delay in steps
    pub fn delay_steps(&self) -> u32 {
        self.delay_steps
    }

    /// Source population
    pub fn src(&self) -> NeuronGroupId {
        self.src
    }

    /// Target population
    pub fn trg(&self) -> NeuronGroupId {
        self.trg
    }

    /// Position of this group in the target's incoming list
    pub fn target_input_index(&self) -> usize {
        self.target_input_index
    }

    /// Cluster host running the propagation
    pub fn host_id(&self) -> u32 {
        self.host_id
    }

    /// Learning rule, present iff the weight update model learns
    pub fn learning(&self) -> Option<&PiecewiseRule> {
        self.learning.as_ref()
    }

    /// True when the group learns
    pub fn is_learning(&self) -> bool {
        self.learning.is_some()
    }

    /// True when the group propagates spike events rather than true spikes
    pub fn is_event_driven(&self) -> bool {
        self.wu_model.event_threshold_code.is_some()
    }

    /// Event predicate with parameters bound, once the planner has run
    pub fn event_condition(&self) -> Option<&str> {
        self.event_condition.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> PiecewiseRule {
        PiecewiseRule {
            t_shift: 0.0,
            k1: 10.0,
            k2: -5.0,
            k3: -20.0,
            depress_max: 0.5,
            slope_pos: -0.1,
            slope_neg: 0.2,
            offset: 1.0,
            depress_min: 0.25,
            g_mid: 0.5,
            g_slope: 10.0,
            g_max: 1.0,
        }
    }

    #[test]
    fn branches_follow_strict_comparisons() {
        let r = rule();
        assert_eq!(r.branch(15.0), LearningBranch::LargePositive);
        assert_eq!(r.branch(3.0), LearningBranch::SmallPositive);
        assert_eq!(r.branch(-12.0), LearningBranch::LessNegative);
        assert_eq!(r.branch(-30.0), LearningBranch::MostNegative);
        assert_eq!(r.branch(10.0), LearningBranch::SmallPositive);
        assert_eq!(r.branch(-5.0), LearningBranch::LessNegative);
        assert_eq!(r.branch(-20.0), LearningBranch::MostNegative);
    }

    #[test]
    fn delta_values() {
        let r = rule();
        assert_eq!(r.delta(15.0), -0.5);
        assert!((r.delta(3.0) - 0.7).abs() < 1e-12);
        assert!((r.delta(-12.0) - (-1.4)).abs() < 1e-12);
        assert_eq!(r.delta(-30.0), -0.25);
    }

    #[test]
    fn g_func_saturates() {
        let r = rule();
        assert!((r.g_func(0.5) - 0.5).abs() < 1e-12);
        assert!(r.g_func(10.0) > 0.999);
        assert!(r.g_func(-10.0) < 1e-3);
    }

    #[test]
    fn knots_must_be_ordered() {
        let mut r = rule();
        assert!(r.validate().is_ok());
        r.k2 = 20.0;
        assert!(r.validate().is_err());
    }
}
