//! Planner passes run over the model graph before emission

use snnc_model::{ModelSpec, NeuronGroupId, SynapseGroupId, WeightStorage};

use crate::config::{BackendKind, GeneratorConfig};
use crate::substitution::{LayerKind, SymbolTable};
use crate::{CompilerError, Result};

/// A planning pass over the model graph
pub trait Pass {
    /// Human-readable pass name
    fn name(&self) -> &'static str;
    /// Execute the pass, mutating the model in-place
    fn run(&self, model: &mut ModelSpec) -> Result<()>;
}

/// Runs passes in sequence
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create an empty pass manager
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The fixed planning pipeline for a configuration
    pub fn standard(config: &GeneratorConfig) -> Self {
        let mut pm = Self::new();
        pm.add(Box::new(DerivedParamsPass));
        pm.add(Box::new(DelaySlotPass));
        pm.add(Box::new(QueuePass));
        pm.add(Box::new(SizePass {
            block_size: config.block_size,
        }));
        pm.add(Box::new(ClusterPass {
            backend: config.backend,
        }));
        pm
    }

    /// Append a pass to the pipeline
    pub fn add(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Names of the passes in order
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run all passes in order
    pub fn run(&self, model: &mut ModelSpec) -> Result<()> {
        for p in &self.passes {
            log::debug!("running pass '{}' on model '{}'", p.name(), model.name());
            p.run(model)?;
        }
        Ok(())
    }
}

/// Computes derived parameters of every group that has none yet
pub struct DerivedParamsPass;

impl Pass for DerivedParamsPass {
    fn name(&self) -> &'static str {
        "derived-params"
    }

    fn run(&self, model: &mut ModelSpec) -> Result<()> {
        let dt = model.dt();
        let neurons: Vec<NeuronGroupId> = model
            .neuron_groups()
            .filter(|(_, g)| !g.derived_params_initialized())
            .map(|(id, _)| id)
            .collect();
        for id in neurons {
            model.neuron_group_mut(id)?.init_derived_params(dt)?;
        }
        let synapses: Vec<SynapseGroupId> = model
            .synapse_groups()
            .filter(|(_, g)| !g.derived_params_initialized())
            .map(|(id, _)| id)
            .collect();
        for id in synapses {
            model.synapse_group_mut(id)?.init_derived_params(dt)?;
        }
        Ok(())
    }
}

/// Sizes every source population's delay ring from its outgoing delays
pub struct DelaySlotPass;

impl Pass for DelaySlotPass {
    fn name(&self) -> &'static str {
        "delay-slots"
    }

    fn run(&self, model: &mut ModelSpec) -> Result<()> {
        let requests: Vec<(NeuronGroupId, u32)> = model
            .synapse_groups()
            .map(|(_, sg)| (sg.src(), sg.delay_steps()))
            .collect();
        for (src, delay) in requests {
            model.neuron_group_mut(src)?.check_num_delay_slots(delay);
        }
        Ok(())
    }
}

struct Route {
    id: SynapseGroupId,
    name: String,
    src: NeuronGroupId,
    trg: NeuronGroupId,
    bound_condition: Option<String>,
    fragments: Vec<String>,
    learning: bool,
}

/// Every synapse-side fragment that may read presynaptic variables
pub(crate) fn synapse_fragments(model: &ModelSpec, id: SynapseGroupId) -> Vec<String> {
    let sg = model.synapse_group(id);
    let wu = sg.wu_model();
    let mut out = vec![wu.input_code.clone()];
    out.extend(wu.event_threshold_code.clone());
    if let WeightStorage::Computed(expr) = sg.weights() {
        out.push(expr.clone());
    }
    out
}

/// Propagates spike, spike-event, spike-time and variable-queue needs to populations.
///
/// Event predicates get the synapse's own parameters bound before they are
/// registered on the source, so groups sharing a model but not parameter
/// values register distinct conditions.
pub struct QueuePass;

impl Pass for QueuePass {
    fn name(&self) -> &'static str {
        "queue-needs"
    }

    fn run(&self, model: &mut ModelSpec) -> Result<()> {
        let precision = model.precision();
        let mut routes = Vec::new();
        for (id, sg) in model.synapse_groups() {
            let wu = sg.wu_model();
            let bound_condition = match &wu.event_threshold_code {
                Some(code) => {
                    let mut table = SymbolTable::new();
                    table.bind_values(LayerKind::Params, &wu.params, sg.wu_params(), precision)?;
                    table.bind_values(
                        LayerKind::DerivedParams,
                        wu.derived_params.iter().map(|d| d.name.clone()),
                        sg.wu_derived_params(),
                        precision,
                    )?;
                    Some(table.substitute_partial(code))
                }
                None => None,
            };
            routes.push(Route {
                id,
                name: sg.name().to_string(),
                src: sg.src(),
                trg: sg.trg(),
                bound_condition,
                fragments: synapse_fragments(model, id),
                learning: sg.is_learning(),
            });
        }

        for route in routes {
            let src = model.neuron_group_mut(route.src)?;
            for code in &route.fragments {
                src.update_var_queues(code);
            }
            match &route.bound_condition {
                Some(cond) => {
                    src.add_spike_event_condition(cond.clone(), route.name.clone());
                    src.set_spike_event_required();
                }
                None => src.set_true_spike_required(),
            }
            if route.learning {
                src.set_true_spike_required();
                src.set_spike_time_required();
                let trg = model.neuron_group_mut(route.trg)?;
                trg.set_true_spike_required();
                trg.set_spike_time_required();
            }
            if let Some(cond) = route.bound_condition {
                model.synapse_group_mut(route.id)?.set_event_condition(cond);
            }
        }
        Ok(())
    }
}

/// Records cumulative and block-padded neuron offsets in declaration order
pub struct SizePass {
    /// Padding granularity
    pub block_size: u32,
}

impl Pass for SizePass {
    fn name(&self) -> &'static str {
        "calc-sizes"
    }

    fn run(&self, model: &mut ModelSpec) -> Result<()> {
        let ids: Vec<NeuronGroupId> = model.neuron_groups().map(|(id, _)| id).collect();
        let (mut cum_sum, mut padded_cum_sum) = (0u32, 0u32);
        for id in ids {
            model
                .neuron_group_mut(id)?
                .calc_sizes(self.block_size, &mut cum_sum, &mut padded_cum_sum);
        }
        log::debug!("{cum_sum} neurons, {padded_cum_sum} padded");
        Ok(())
    }
}

/// Validates host placement against the backend
pub struct ClusterPass {
    /// Target backend
    pub backend: BackendKind,
}

impl ClusterPass {
    /// Check placement without touching the model
    pub fn validate(&self, model: &ModelSpec) -> Result<()> {
        let hosts = model.host_ids();
        if self.backend != BackendKind::Mpi {
            if hosts.iter().any(|h| *h != 0) {
                return Err(CompilerError::Cluster(format!(
                    "model places groups on hosts {hosts:?} but backend '{}' runs on a single host",
                    self.backend
                )));
            }
            return Ok(());
        }

        for (id, sg) in model.synapse_groups() {
            let src = model.neuron_group(sg.src());
            if sg.host_id() == src.host_id() {
                continue;
            }
            if sg.is_learning() {
                return Err(CompilerError::Cluster(format!(
                    "learning synapse group '{}' runs on host {} but its source '{}' lives on host {}",
                    sg.name(),
                    sg.host_id(),
                    src.name(),
                    src.host_id()
                )));
            }
            let reads_pre = synapse_fragments(model, id).iter().any(|code| {
                src.model()
                    .vars
                    .iter()
                    .any(|v| snnc_model::code::references_presynaptic(code, &v.name))
            });
            if reads_pre {
                return Err(CompilerError::Cluster(format!(
                    "synapse group '{}' reads presynaptic variables of '{}', which are not exchanged between hosts",
                    sg.name(),
                    src.name()
                )));
            }
        }
        log::info!("model '{}' spans {} host(s)", model.name(), hosts.len());
        Ok(())
    }
}

impl Pass for ClusterPass {
    fn name(&self) -> &'static str {
        "cluster"
    }

    fn run(&self, model: &mut ModelSpec) -> Result<()> {
        self.validate(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snnc_model::{builtin, Connectivity, SynapsePopulation};
    use std::sync::Arc;

    fn model() -> ModelSpec {
        let mut m = ModelSpec::new("passes");
        m.set_dt(0.1).unwrap();
        let izh = Arc::new(builtin::izhikevich());
        for (name, n) in [("PN", 10), ("KC", 40), ("LHI", 5)] {
            m.add_neuron_population(name, n, izh.clone(), vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
                .unwrap();
        }
        m.add_synapse_population(
            SynapsePopulation::new(
                "PNKC",
                "PN",
                "KC",
                Arc::new(builtin::graded()),
                Arc::new(builtin::exp_cond()),
            )
            .with_wu_params(vec![-20.0, 2.0])
            .with_ps_params(vec![1.0, 0.0])
            .with_delay(2),
        )
        .unwrap();
        m.add_synapse_population(
            SynapsePopulation::new(
                "PNLHI",
                "PN",
                "LHI",
                Arc::new(builtin::static_pulse()),
                Arc::new(builtin::delta_curr()),
            )
            .with_connectivity(Connectivity::Sparse)
            .with_delay(5),
        )
        .unwrap();
        m
    }

    #[test]
    fn pipeline_plans_source_population() {
        let mut m = model();
        PassManager::standard(&GeneratorConfig::default()).run(&mut m).unwrap();
        let pn = m.neuron_group(m.find_neuron_group("PN").unwrap());
        assert_eq!(pn.num_delay_slots(), 6);
        assert_eq!(pn.var_need_queue(), &[true, false]);
        assert!(pn.needs_spike_events());
        assert!(pn.needs_true_spike());
        let conds: Vec<_> = pn.spike_event_conditions().collect();
        assert_eq!(conds, vec![("$(V_pre) > (-20.0f)", "PNKC")]);

        let sg = m.synapse_group(m.find_synapse_group("PNKC").unwrap());
        assert_eq!(sg.event_condition(), Some("$(V_pre) > (-20.0f)"));
        assert_eq!(sg.ps_derived_params().len(), 1);
    }

    #[test]
    fn passes_are_idempotent() {
        let mut m = model();
        let pm = PassManager::standard(&GeneratorConfig::default());
        pm.run(&mut m).unwrap();
        let snapshot: Vec<_> = m
            .neuron_groups()
            .map(|(_, g)| (g.num_delay_slots(), g.offsets(), g.var_need_queue().to_vec(), g.spike_event_conditions().count()))
            .collect();
        pm.run(&mut m).unwrap();
        let again: Vec<_> = m
            .neuron_groups()
            .map(|(_, g)| (g.num_delay_slots(), g.offsets(), g.var_need_queue().to_vec(), g.spike_event_conditions().count()))
            .collect();
        assert_eq!(snapshot, again);
        assert_eq!(snapshot[1].1, Some((10, 32)));
        assert_eq!(snapshot[2].1, Some((50, 96)));
    }

    #[test]
    fn single_host_backend_rejects_remote_groups() {
        let mut m = model();
        let lhi = m.find_neuron_group("LHI").unwrap();
        m.neuron_group_mut(lhi).unwrap().set_cluster_index(1, 0);
        let err = PassManager::standard(&GeneratorConfig::default())
            .run(&mut m)
            .unwrap_err();
        assert!(matches!(err, CompilerError::Cluster(_)));
    }

    #[test]
    fn remote_graded_synapse_rejected_under_mpi() {
        let mut m = model();
        let id = m.find_synapse_group("PNKC").unwrap();
        m.synapse_group_mut(id).unwrap().set_host_id(1);
        let err = PassManager::standard(&GeneratorConfig::for_backend(BackendKind::Mpi))
            .run(&mut m)
            .unwrap_err();
        assert!(err.to_string().contains("presynaptic variables"));
    }
}
