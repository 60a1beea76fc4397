//! Model inspection command

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;
use snnc_compiler::{finalize_model, BackendKind};
use snnc_model::{ExchangePlan, ModelSpec};
use tracing::info;

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::model_file::ModelFile;

/// Summarize a model after planning
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Model file (TOML)
    pub model: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: InspectFormat,

    /// Plan for this backend instead of the configured one
    #[arg(long, value_parser = super::generate::parse_backend)]
    pub backend: Option<BackendKind>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InspectFormat {
    Text,
    Json,
}

/// Planned model, as printed by `inspect`
#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub dt: f64,
    pub precision: String,
    pub total_neurons: u64,
    pub neurons: Vec<NeuronSummary>,
    pub synapses: Vec<SynapseSummary>,
    pub exchange: Vec<TransferSummary>,
}

#[derive(Debug, Serialize)]
pub struct NeuronSummary {
    pub name: String,
    pub model: String,
    pub size: u32,
    pub host: u32,
    pub delay_slots: u32,
    pub spike_times: bool,
    pub spike_events: bool,
    pub queued_vars: Vec<String>,
    pub zero_copy: bool,
}

#[derive(Debug, Serialize)]
pub struct SynapseSummary {
    pub name: String,
    pub source: String,
    pub target: String,
    pub connectivity: String,
    pub delay: u32,
    pub event_driven: bool,
    pub learning: bool,
    pub host: u32,
}

#[derive(Debug, Serialize)]
pub struct TransferSummary {
    pub population: String,
    pub carries: Vec<&'static str>,
    pub tag: u32,
    pub sender: u32,
    pub receiver: u32,
}

impl ModelSummary {
    /// Summarize a finalized model
    pub fn of(model: &ModelSpec) -> Self {
        let neurons = model
            .neuron_groups()
            .map(|(_, ng)| NeuronSummary {
                name: ng.name().to_string(),
                model: ng.model().name.clone(),
                size: ng.num_neurons(),
                host: ng.host_id(),
                delay_slots: ng.num_delay_slots(),
                spike_times: ng.needs_spike_time(),
                spike_events: ng.needs_spike_events(),
                queued_vars: ng
                    .model()
                    .vars
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| ng.var_needs_queue(*i))
                    .map(|(_, v)| v.name.clone())
                    .collect(),
                zero_copy: ng.uses_zero_copy(),
            })
            .collect();
        let synapses = model
            .synapse_groups()
            .map(|(_, sg)| SynapseSummary {
                name: sg.name().to_string(),
                source: model.neuron_group(sg.src()).name().to_string(),
                target: model.neuron_group(sg.trg()).name().to_string(),
                connectivity: sg.connectivity().as_str().to_string(),
                delay: sg.delay_steps(),
                event_driven: sg.is_event_driven(),
                learning: sg.is_learning(),
                host: sg.host_id(),
            })
            .collect();
        let exchange = ExchangePlan::build(model)
            .transfers()
            .iter()
            .map(|t| TransferSummary {
                population: model.neuron_group(t.population).name().to_string(),
                carries: t.kinds().iter().map(|k| k.label()).collect(),
                tag: t.tag,
                sender: t.sender,
                receiver: t.receiver,
            })
            .collect();
        Self {
            name: model.name().to_string(),
            dt: model.dt(),
            precision: model.precision().c_type().to_string(),
            total_neurons: model.total_neurons(),
            neurons,
            synapses,
            exchange,
        }
    }

    fn print_text(&self) {
        println!("model {} (dt = {}, {})", self.name, self.dt, self.precision);
        println!("{} neurons in {} populations", self.total_neurons, self.neurons.len());
        for n in &self.neurons {
            println!(
                "  {:<12} {:<14} n={:<6} host={} slots={}{}{}",
                n.name,
                n.model,
                n.size,
                n.host,
                n.delay_slots,
                if n.spike_times { " sT" } else { "" },
                if n.spike_events { " events" } else { "" },
            );
            if !n.queued_vars.is_empty() {
                println!("               queued: {}", n.queued_vars.join(", "));
            }
        }
        for s in &self.synapses {
            println!(
                "  {:<12} {} -> {} {} delay={} host={}{}",
                s.name,
                s.source,
                s.target,
                s.connectivity,
                s.delay,
                s.host,
                if s.learning { " learning" } else { "" },
            );
        }
        for t in &self.exchange {
            println!(
                "  exchange tag {}: {} {} host {} -> host {}",
                t.tag,
                t.population,
                t.carries.join("+"),
                t.sender,
                t.receiver
            );
        }
    }
}

impl InspectCommand {
    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        info!("Inspecting {}", self.model.display());
        let mut model = ModelFile::load(&self.model)?.to_model()?;
        let mut generator = config.generator.clone();
        if let Some(backend) = self.backend {
            generator.backend = backend;
        }
        finalize_model(&mut model, &generator)?;
        let summary = ModelSummary::of(&model);
        match self.format {
            InspectFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            InspectFormat::Text => summary.print_text(),
        }
        Ok(())
    }
}
