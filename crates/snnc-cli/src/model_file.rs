//! TOML model files.
//!
//! A model file declares global settings, populations and projections by
//! name. Neuron models are looked up among the built-ins or in the file's own
//! `[neuron_models.<name>]` tables; synapse models must be built in.
//!
//! ```toml
//! name = "pair"
//! dt = 0.1
//!
//! [[neurons]]
//! name = "PN"
//! size = 10
//! model = "poisson"
//! params = [0.1, 2.5, 20.0, -60.0]
//! init = [-60.0, 0.0, -10.0]
//!
//! [[synapses]]
//! name = "PNKC"
//! source = "PN"
//! target = "KC"
//! weight_update = "static_pulse"
//! postsynaptic = "exp_cond"
//! connectivity = "sparse"
//! ps_params = [1.0, 0.0]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use snnc_model::{
    builtin, Connectivity, InputCurrent, ModelSpec, NeuronModel, PiecewiseRule, Precision,
    SynapsePopulation, WeightStorage,
};

use crate::error::{CliError, CliResult};

/// Whole model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    /// Model name, also the default output directory prefix
    pub name: String,
    /// Integration step
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Scalar precision
    #[serde(default)]
    pub precision: Precision,
    /// Neuron models defined in the file
    #[serde(default)]
    pub neuron_models: BTreeMap<String, NeuronModelDef>,
    /// Populations, in declaration order
    #[serde(default)]
    pub neurons: Vec<NeuronDef>,
    /// Projections, in declaration order
    #[serde(default)]
    pub synapses: Vec<SynapseDef>,
}

fn default_dt() -> f64 {
    0.5
}

/// User-defined neuron model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeuronModelDef {
    /// `[name, type]` pairs
    #[serde(default)]
    pub vars: Vec<(String, String)>,
    /// Parameter names
    #[serde(default)]
    pub params: Vec<String>,
    /// Update code
    #[serde(default)]
    pub sim_code: String,
    /// Spike predicate
    pub threshold: Option<String>,
    /// Code run on a true spike
    pub reset: Option<String>,
}

impl NeuronModelDef {
    fn build(&self, name: &str) -> NeuronModel {
        let vars: Vec<(&str, &str)> = self
            .vars
            .iter()
            .map(|(n, t)| (n.as_str(), t.as_str()))
            .collect();
        let params: Vec<&str> = self.params.iter().map(String::as_str).collect();
        let mut model = NeuronModel::new(name)
            .with_vars(&vars)
            .with_params(&params)
            .with_sim_code(self.sim_code.clone());
        if let Some(threshold) = &self.threshold {
            model = model.with_threshold(threshold.clone());
        }
        if let Some(reset) = &self.reset {
            model = model.with_reset(reset.clone());
        }
        model
    }
}

/// One neuron population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeuronDef {
    /// Population name
    pub name: String,
    /// Number of neurons
    pub size: u32,
    /// Built-in or file-defined model
    pub model: String,
    /// Parameter values
    #[serde(default)]
    pub params: Vec<f64>,
    /// Initial variable values
    #[serde(default)]
    pub init: Vec<f64>,
    /// Cluster host
    #[serde(default)]
    pub host: u32,
    /// Device on the host
    #[serde(default)]
    pub device: u32,
    /// External input current
    #[serde(default)]
    pub input: InputCurrent,
    /// Place the spike buffers in zero-copy memory
    #[serde(default)]
    pub spike_zero_copy: bool,
    /// Variables placed in zero-copy memory
    #[serde(default)]
    pub zero_copy_vars: Vec<String>,
}

/// One synapse population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynapseDef {
    /// Group name
    pub name: String,
    /// Source population
    pub source: String,
    /// Target population
    pub target: String,
    /// Built-in weight update model
    pub weight_update: String,
    /// Built-in postsynaptic model
    pub postsynaptic: String,
    /// Connectivity representation
    #[serde(default)]
    pub connectivity: Connectivity,
    /// Weight source
    #[serde(default)]
    pub weights: WeightStorage,
    /// Propagation delay in steps
    #[serde(default)]
    pub delay: u32,
    /// Weight update parameters
    #[serde(default)]
    pub wu_params: Vec<f64>,
    /// Postsynaptic parameters
    #[serde(default)]
    pub ps_params: Vec<f64>,
    /// Postsynaptic initial values
    #[serde(default)]
    pub ps_init: Vec<f64>,
    /// Learning rule
    pub learning: Option<PiecewiseRule>,
    /// Cluster host running the propagation
    #[serde(default)]
    pub host: u32,
}

impl ModelFile {
    /// Parse model file text; `origin` names the source in errors
    pub fn parse(text: &str, origin: &str) -> CliResult<Self> {
        toml::from_str(text).map_err(|e| CliError::model_file(origin, e.to_string()))
    }

    /// Read and parse a model file
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::model_file(path.display().to_string(), e.to_string())
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    fn neuron_model(&self, group: &NeuronDef) -> CliResult<NeuronModel> {
        if let Some(def) = self.neuron_models.get(&group.model) {
            return Ok(def.build(&group.model));
        }
        builtin::neuron_model(&group.model).ok_or_else(|| CliError::UnknownModel {
            kind: "neuron",
            name: group.model.clone(),
            group: group.name.clone(),
        })
    }

    /// Declare everything in a fresh [`ModelSpec`]
    pub fn to_model(&self) -> CliResult<ModelSpec> {
        let mut model = ModelSpec::new(self.name.clone());
        model.set_dt(self.dt)?;
        model.set_precision(self.precision)?;

        for def in &self.neurons {
            let neuron_model = Arc::new(self.neuron_model(def)?);
            let id = model.add_neuron_population(
                &def.name,
                def.size,
                neuron_model,
                def.params.clone(),
                def.init.clone(),
            )?;
            let ng = model.neuron_group_mut(id)?;
            ng.set_cluster_index(def.host, def.device);
            ng.set_input(def.input);
            ng.set_spike_zero_copy(def.spike_zero_copy);
            for var in &def.zero_copy_vars {
                ng.set_var_zero_copy(var)?;
            }
        }

        for def in &self.synapses {
            let wu = builtin::weight_update_model(&def.weight_update).ok_or_else(|| {
                CliError::UnknownModel {
                    kind: "weight update",
                    name: def.weight_update.clone(),
                    group: def.name.clone(),
                }
            })?;
            let ps = builtin::postsynaptic_model(&def.postsynaptic).ok_or_else(|| {
                CliError::UnknownModel {
                    kind: "postsynaptic",
                    name: def.postsynaptic.clone(),
                    group: def.name.clone(),
                }
            })?;
            let mut desc = SynapsePopulation::new(
                def.name.clone(),
                def.source.clone(),
                def.target.clone(),
                Arc::new(wu),
                Arc::new(ps),
            )
            .with_connectivity(def.connectivity)
            .with_weights(def.weights.clone())
            .with_delay(def.delay)
            .with_wu_params(def.wu_params.clone())
            .with_ps_params(def.ps_params.clone())
            .with_ps_init(def.ps_init.clone())
            .with_host(def.host);
            if let Some(rule) = def.learning {
                desc = desc.with_learning(rule);
            }
            model.add_synapse_population(desc)?;
        }

        tracing::debug!(
            "declared model '{}': {} neuron groups, {} synapse groups",
            self.name,
            model.num_neuron_groups(),
            model.num_synapse_groups()
        );
        Ok(model)
    }
}
