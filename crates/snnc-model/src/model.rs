//! Arena-backed model graph.
//!
//! Groups live in two vectors and reference each other through
//! [`NeuronGroupId`] / [`SynapseGroupId`]. Names are resolved to handles once,
//! at declaration; everything after that is index arithmetic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::models::{NeuronModel, PostsynapticModel, WeightUpdateModel};
use crate::neuron_group::NeuronGroup;
use crate::synapse_group::{Connectivity, PiecewiseRule, SynapseGroup, WeightStorage};
use crate::{ModelError, Result};

/// Handle of a neuron group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeuronGroupId(pub usize);

/// Handle of a synapse group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SynapseGroupId(pub usize);

impl fmt::Display for NeuronGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ng#{}", self.0)
    }
}

impl fmt::Display for SynapseGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sg#{}", self.0)
    }
}

/// Floating-point precision of generated state and persisted weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Precision {
    /// 32-bit `float`
    #[default]
    Float,
    /// 64-bit `double`
    Double,
}

impl Precision {
    /// C type name
    pub fn c_type(&self) -> &'static str {
        match self {
            Precision::Float => "float",
            Precision::Double => "double",
        }
    }

    /// Size of one value in bytes
    pub fn byte_width(&self) -> usize {
        match self {
            Precision::Float => 4,
            Precision::Double => 8,
        }
    }
}

/// Declaration of a synapse population, consumed by [`ModelSpec::add_synapse_population`]
#[derive(Debug, Clone)]
pub struct SynapsePopulation {
    /// Group name
    pub name: String,
    /// Source neuron group name
    pub source: String,
    /// Target neuron group name
    pub target: String,
    /// Connectivity representation
    pub connectivity: Connectivity,
    /// Weight storage mode
    pub weights: WeightStorage,
    /// Propagation delay in steps
    pub delay_steps: u32,
    /// Weight update model
    pub weight_update: Arc<WeightUpdateModel>,
    /// Weight update parameter values
    pub wu_params: Vec<f64>,
    /// Postsynaptic model
    pub postsynaptic: Arc<PostsynapticModel>,
    /// Postsynaptic parameter values
    pub ps_params: Vec<f64>,
    /// Postsynaptic state initial values
    pub ps_init_vals: Vec<f64>,
    /// Learning rule (required for learning models)
    pub learning: Option<PiecewiseRule>,
    /// Cluster host running the propagation
    pub host_id: u32,
}

impl SynapsePopulation {
    /// Dense, individually weighted, undelayed projection on host 0
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        weight_update: Arc<WeightUpdateModel>,
        postsynaptic: Arc<PostsynapticModel>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            connectivity: Connectivity::Dense,
            weights: WeightStorage::Individual,
            delay_steps: 0,
            weight_update,
            wu_params: Vec::new(),
            postsynaptic,
            ps_params: Vec::new(),
            ps_init_vals: Vec::new(),
            learning: None,
            host_id: 0,
        }
    }

    /// Set the connectivity representation
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Set the weight storage mode
    pub fn with_weights(mut self, weights: WeightStorage) -> Self {
        self.weights = weights;
        self
    }

    /// Set the propagation delay in steps
    pub fn with_delay(mut self, steps: u32) -> Self {
        self.delay_steps = steps;
        self
    }

    /// Set the weight update parameter values
    pub fn with_wu_params(mut self, params: Vec<f64>) -> Self {
        self.wu_params = params;
        self
    }

    /// Set the postsynaptic parameter values
    pub fn with_ps_params(mut self, params: Vec<f64>) -> Self {
        self.ps_params = params;
        self
    }

    /// Set the postsynaptic state initial values
    pub fn with_ps_init(mut self, init: Vec<f64>) -> Self {
        self.ps_init_vals = init;
        self
    }

    /// Attach a learning rule
    pub fn with_learning(mut self, rule: PiecewiseRule) -> Self {
        self.learning = Some(rule);
        self
    }

    /// Place on a cluster host
    pub fn with_host(mut self, host_id: u32) -> Self {
        self.host_id = host_id;
        self
    }
}

/// The whole model: global settings plus the group arenas
#[derive(Debug, Clone)]
pub struct ModelSpec {
    name: String,
    dt: f64,
    precision: Precision,
    neuron_groups: Vec<NeuronGroup>,
    synapse_groups: Vec<SynapseGroup>,
    neuron_names: BTreeMap<String, NeuronGroupId>,
    synapse_names: BTreeMap<String, SynapseGroupId>,
    finalized: bool,
}

impl ModelSpec {
    /// Empty model with `dt = 0.5` and float precision
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dt: 0.5,
            precision: Precision::Float,
            neuron_groups: Vec::new(),
            synapse_groups: Vec::new(),
            neuron_names: BTreeMap::new(),
            synapse_names: BTreeMap::new(),
            finalized: false,
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.finalized {
            return Err(ModelError::Finalized(self.name.clone()));
        }
        Ok(())
    }

    /// Set the integration step
    pub fn set_dt(&mut self, dt: f64) -> Result<()> {
        self.check_open()?;
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(ModelError::invalid_parameter("dt", dt.to_string(), "> 0"));
        }
        self.dt = dt;
        Ok(())
    }

    /// Set the numeric precision
    pub fn set_precision(&mut self, precision: Precision) -> Result<()> {
        self.check_open()?;
        self.precision = precision;
        Ok(())
    }

    /// Declare a neuron population
    pub fn add_neuron_population(
        &mut self,
        name: &str,
        num_neurons: u32,
        model: Arc<NeuronModel>,
        params: Vec<f64>,
        init_vals: Vec<f64>,
    ) -> Result<NeuronGroupId> {
        self.check_open()?;
        if !crate::code::is_identifier(name) {
            return Err(ModelError::invalid_parameter(
                "neuron group name",
                name,
                "a C identifier",
            ));
        }
        if self.neuron_names.contains_key(name) {
            return Err(ModelError::DuplicateName {
                kind: "neuron",
                name: name.to_string(),
            });
        }
        let group = NeuronGroup::new(name, num_neurons, model, params, init_vals)?;
        let id = NeuronGroupId(self.neuron_groups.len());
        self.neuron_groups.push(group);
        self.neuron_names.insert(name.to_string(), id);
        log::debug!("added neuron population {name} ({num_neurons} neurons) as {id}");
        Ok(id)
    }

    /// Declare a synapse population, resolving its endpoints and attaching it to them
    pub fn add_synapse_population(&mut self, desc: SynapsePopulation) -> Result<SynapseGroupId> {
        self.check_open()?;
        let SynapsePopulation {
            name,
            source,
            target,
            connectivity,
            weights,
            delay_steps,
            weight_update,
            wu_params,
            postsynaptic,
            ps_params,
            ps_init_vals,
            learning,
            host_id,
        } = desc;

        if !crate::code::is_identifier(&name) {
            return Err(ModelError::invalid_parameter(
                "synapse group name",
                name,
                "a C identifier",
            ));
        }
        if self.synapse_names.contains_key(&name) {
            return Err(ModelError::DuplicateName {
                kind: "synapse",
                name,
            });
        }
        let src = self
            .find_neuron_group(&source)
            .ok_or_else(|| ModelError::UnknownNeuronGroup(source.clone()))?;
        let trg = self
            .find_neuron_group(&target)
            .ok_or_else(|| ModelError::UnknownNeuronGroup(target.clone()))?;

        let count_check = |what: &'static str, model: &str, expected: usize, found: usize| {
            if expected == found {
                Ok(())
            } else {
                Err(ModelError::ValueCount {
                    group: name.clone(),
                    model: model.to_string(),
                    what,
                    expected,
                    found,
                })
            }
        };
        count_check(
            "parameters",
            &weight_update.name,
            weight_update.params.len(),
            wu_params.len(),
        )?;
        count_check(
            "parameters",
            &postsynaptic.name,
            postsynaptic.params.len(),
            ps_params.len(),
        )?;
        count_check(
            "initial values",
            &postsynaptic.name,
            postsynaptic.vars.len(),
            ps_init_vals.len(),
        )?;

        match (&learning, weight_update.learning) {
            (Some(rule), true) => {
                rule.validate()?;
                if weights != WeightStorage::Individual {
                    return Err(ModelError::invalid_synapse_group(
                        &name,
                        "learning requires individual weights",
                    ));
                }
            }
            (None, true) => {
                return Err(ModelError::invalid_synapse_group(
                    &name,
                    format!("model '{}' learns but no learning rule was given", weight_update.name),
                ))
            }
            (Some(_), false) => {
                return Err(ModelError::invalid_synapse_group(
                    &name,
                    format!("model '{}' does not support learning", weight_update.name),
                ))
            }
            (None, false) => {}
        }
        if connectivity == Connectivity::Bitmask && !matches!(weights, WeightStorage::Global(_)) {
            return Err(ModelError::invalid_synapse_group(
                &name,
                "bitmask connectivity gates a global weight",
            ));
        }

        let id = SynapseGroupId(self.synapse_groups.len());
        self.neuron_groups[src.0].add_out_syn(id);
        let target_input_index = self.neuron_groups[trg.0].add_in_syn(id);
        self.synapse_groups.push(SynapseGroup {
            name: name.clone(),
            connectivity,
            weights,
            wu_model: weight_update,
            wu_params,
            wu_derived: None,
            ps_model: postsynaptic,
            ps_params,
            ps_derived: None,
            ps_init_vals,
            delay_steps,
            src,
            trg,
            target_input_index,
            host_id,
            learning,
            event_condition: None,
        });
        log::debug!("added synapse population {name} ({source} -> {target}) as {id}");
        self.synapse_names.insert(name, id);
        Ok(id)
    }

    /// Freeze the graph; later mutation fails with [`ModelError::Finalized`]
    pub fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    /// True once frozen
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Integration step
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Numeric precision
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Handle of a neuron group by name
    pub fn find_neuron_group(&self, name: &str) -> Option<NeuronGroupId> {
        self.neuron_names.get(name).copied()
    }

    /// Handle of a synapse group by name
    pub fn find_synapse_group(&self, name: &str) -> Option<SynapseGroupId> {
        self.synapse_names.get(name).copied()
    }

    /// Neuron group by handle
    pub fn neuron_group(&self, id: NeuronGroupId) -> &NeuronGroup {
        &self.neuron_groups[id.0]
    }

    /// Synapse group by handle
    pub fn synapse_group(&self, id: SynapseGroupId) -> &SynapseGroup {
        &self.synapse_groups[id.0]
    }

    /// Mutable neuron group; fails once finalized
    pub fn neuron_group_mut(&mut self, id: NeuronGroupId) -> Result<&mut NeuronGroup> {
        self.check_open()?;
        Ok(&mut self.neuron_groups[id.0])
    }

    /// Mutable synapse group; fails once finalized
    pub fn synapse_group_mut(&mut self, id: SynapseGroupId) -> Result<&mut SynapseGroup> {
        self.check_open()?;
        Ok(&mut self.synapse_groups[id.0])
    }

    /// Neuron groups with their handles, in declaration order
    pub fn neuron_groups(&self) -> impl Iterator<Item = (NeuronGroupId, &NeuronGroup)> {
        self.neuron_groups
            .iter()
            .enumerate()
            .map(|(i, g)| (NeuronGroupId(i), g))
    }

    /// Synapse groups with their handles, in declaration order
    pub fn synapse_groups(&self) -> impl Iterator<Item = (SynapseGroupId, &SynapseGroup)> {
        self.synapse_groups
            .iter()
            .enumerate()
            .map(|(i, g)| (SynapseGroupId(i), g))
    }

    /// Number of neuron groups
    pub fn num_neuron_groups(&self) -> usize {
        self.neuron_groups.len()
    }

    /// Number of synapse groups
    pub fn num_synapse_groups(&self) -> usize {
        self.synapse_groups.len()
    }

    /// Total neurons across all groups
    pub fn total_neurons(&self) -> u64 {
        self.neuron_groups
            .iter()
            .map(|g| u64::from(g.num_neurons()))
            .sum()
    }

    /// True when any synapse group learns
    pub fn any_learning(&self) -> bool {
        self.synapse_groups.iter().any(SynapseGroup::is_learning)
    }

    /// Every cluster host referenced by a group
    pub fn host_ids(&self) -> BTreeSet<u32> {
        self.neuron_groups
            .iter()
            .map(NeuronGroup::host_id)
            .chain(self.synapse_groups.iter().map(SynapseGroup::host_id))
            .collect()
    }

    /// True when some synapse runs on a different host than its source population
    pub fn is_distributed(&self) -> bool {
        self.synapse_groups
            .iter()
            .any(|sg| sg.host_id() != self.neuron_group(sg.src()).host_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    fn two_pops() -> ModelSpec {
        let mut m = ModelSpec::new("test");
        let izh = Arc::new(builtin::izhikevich());
        m.add_neuron_population("PN", 10, izh.clone(), vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
            .unwrap();
        m.add_neuron_population("KC", 20, izh, vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
            .unwrap();
        m
    }

    fn pulse(name: &str, src: &str, trg: &str) -> SynapsePopulation {
        SynapsePopulation::new(
            name,
            src,
            trg,
            Arc::new(builtin::static_pulse()),
            Arc::new(builtin::delta_curr()),
        )
    }

    #[test]
    fn synapses_wire_both_endpoints() {
        let mut m = two_pops();
        let a = m.add_synapse_population(pulse("PNKC", "PN", "KC")).unwrap();
        let b = m.add_synapse_population(pulse("KCKC", "KC", "KC")).unwrap();
        let pn = m.find_neuron_group("PN").unwrap();
        let kc = m.find_neuron_group("KC").unwrap();
        assert_eq!(m.neuron_group(pn).out_syn(), &[a]);
        assert_eq!(m.neuron_group(kc).in_syn(), &[a, b]);
        assert_eq!(m.synapse_group(b).target_input_index(), 1);
        assert_eq!(m.synapse_group(a).src(), pn);
    }

    #[test]
    fn unknown_endpoint_rejected() {
        let mut m = two_pops();
        let err = m.add_synapse_population(pulse("X", "PN", "LHI")).unwrap_err();
        assert_eq!(err, ModelError::UnknownNeuronGroup("LHI".into()));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut m = two_pops();
        let err = m
            .add_neuron_population("PN", 1, Arc::new(builtin::spike_source()), vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName { kind: "neuron", .. }));
    }

    #[test]
    fn learning_requires_rule_and_individual_weights() {
        let mut m = two_pops();
        let desc = SynapsePopulation::new(
            "PNKC",
            "PN",
            "KC",
            Arc::new(builtin::learn1()),
            Arc::new(builtin::delta_curr()),
        )
        .with_wu_params(vec![-20.0]);
        assert!(matches!(
            m.add_synapse_population(desc),
            Err(ModelError::InvalidSynapseGroup { .. })
        ));
    }

    #[test]
    fn finalized_model_is_frozen() {
        let mut m = two_pops();
        m.mark_finalized();
        assert!(m.set_dt(0.1).is_err());
        let pn = m.find_neuron_group("PN").unwrap();
        assert!(matches!(m.neuron_group_mut(pn), Err(ModelError::Finalized(_))));
    }

    #[test]
    fn distributed_detection() {
        let mut m = two_pops();
        m.add_synapse_population(pulse("PNKC", "PN", "KC").with_host(1))
            .unwrap();
        assert!(m.is_distributed());
        assert_eq!(m.host_ids().into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }
}
