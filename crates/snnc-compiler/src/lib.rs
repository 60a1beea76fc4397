#![doc = "snnc code generator - planner passes, substitution and backend emission.\n\nPublic responsibilities:\n- Planner passes (derived parameters, delay slots, queue needs, sizes, cluster placement) run once before the model is frozen\n- Symbolic substitution of `$(name)` placeholders against a layered symbol table\n- Emission of the generated simulation sources for the CPU, parallel CPU and MPI backends\n\nPipeline:\n- `finalize_model`: verify references, run the passes, mark the model finalized\n- `generate`: emit `definitions.h`, `neuronFnct.cc`, `synapseFnct.cc`, `runner.cc` (plus `infraMPI.*` for MPI) as a deterministic file map\n- `write_output`: persist a generated file set\n\nIntegration points:\n- snnc-model: model graph and exchange plan\n- snnc-cli: drives `compile_model` and `write_output`\n"]

#![deny(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use snnc_model::code::placeholders;
use snnc_model::{ModelError, ModelSpec, WeightStorage};

pub mod backend;
pub mod code_stream;
pub mod config;
pub mod connectivity;
pub mod definitions;
pub mod learning;
pub mod naming;
pub mod neuron;
/// Planner passes over the model graph
pub mod passes;
pub mod regime;
pub mod runner;
pub mod substitution;
pub mod synapse;

pub use backend::{Backend, EmitContext};
pub use config::{BackendKind, GeneratorConfig};
pub use passes::{Pass, PassManager};

/// Compiler error type
#[derive(thiserror::Error, Debug)]
pub enum CompilerError {
    /// A `$(name)` placeholder matched no binding
    #[error("Unresolved placeholder $({name}) in {context}")]
    UnresolvedPlaceholder {
        /// Identifier inside the placeholder
        name: String,
        /// Which fragment of which group
        context: String,
    },

    /// A binding would splice another placeholder into the output
    #[error("Replacement for '{name}' contains a placeholder: {replacement}")]
    PlaceholderInReplacement {
        /// Bound identifier
        name: String,
        /// Offending replacement text
        replacement: String,
    },

    /// A regime transition has no trigger condition
    #[error("Transition to regime {target} in {context} has no trigger")]
    MissingTrigger {
        /// Regime the transition leaves
        context: String,
        /// Target regime id
        target: u32,
    },

    /// Generator bug: braces left open in an emitted file
    #[error("Unbalanced braces in {file}: still open {open:?}")]
    UnbalancedBraces {
        /// File being emitted
        file: String,
        /// Ids of the unclosed braces
        open: Vec<u32>,
    },

    /// Model graph error
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Emission requested before the planner ran
    #[error("Model '{0}' must be finalized before code generation")]
    NotFinalized(String),

    /// Host placement not supported by the backend
    #[error("Cluster placement error: {0}")]
    Cluster(String),

    /// Code references a variable that does not exist on the referenced side
    #[error("Invalid reference $({name}) in {context}")]
    InvalidReference {
        /// Identifier inside the placeholder
        name: String,
        /// Which fragment of which group
        context: String,
    },

    /// I/O error while writing generated files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Message(String),
}

/// Result alias for compiler operations
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Emitted source files plus the non-fatal findings collected on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedCode {
    /// File name to contents, ordered by name
    pub files: BTreeMap<String, String>,
    /// Degraded-feature warnings
    pub warnings: Vec<String>,
}

impl GeneratedCode {
    /// Contents of a generated file
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Generated file names in order
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

/// Check that every `_pre` / `_post` reference in synapse code names a variable of that side
pub fn verify_model(model: &ModelSpec) -> Result<()> {
    for (id, sg) in model.synapse_groups() {
        let src = model.neuron_group(sg.src());
        let trg = model.neuron_group(sg.trg());
        for code in passes::synapse_fragments(model, id) {
            for name in placeholders(&code) {
                let (side, var) = if let Some(var) = name.strip_suffix("_pre") {
                    (src, var)
                } else if let Some(var) = name.strip_suffix("_post") {
                    (trg, var)
                } else {
                    continue;
                };
                if side.model().var_index(var).is_none() {
                    return Err(CompilerError::InvalidReference {
                        name: name.to_string(),
                        context: format!("synapse group '{}'", sg.name()),
                    });
                }
            }
        }
        if let WeightStorage::Computed(expr) = sg.weights() {
            if placeholders(expr).any(|p| p == "g") {
                return Err(CompilerError::InvalidReference {
                    name: "g".to_string(),
                    context: format!("computed weight of synapse group '{}'", sg.name()),
                });
            }
        }
    }
    Ok(())
}

/// Verify the model, run the standard passes and freeze it. A no-op on a frozen model.
pub fn finalize_model(model: &mut ModelSpec, config: &GeneratorConfig) -> Result<()> {
    if model.is_finalized() {
        log::debug!("model '{}' already finalized", model.name());
        return Ok(());
    }
    verify_model(model)?;
    PassManager::standard(config).run(model)?;
    model.mark_finalized();
    log::info!(
        "finalized model '{}': {} neuron groups, {} synapse groups, {} neurons",
        model.name(),
        model.num_neuron_groups(),
        model.num_synapse_groups(),
        model.total_neurons()
    );
    Ok(())
}

/// Non-fatal findings about a finalized model
fn collect_warnings(model: &ModelSpec, config: &GeneratorConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    for (_, ng) in model.neuron_groups() {
        if ng.model().threshold_condition_code.is_none() {
            let msg = format!(
                "neuron group '{}' (model {}) has no threshold condition; true spike detection is disabled",
                ng.name(),
                ng.model().name
            );
            log::warn!("{msg}");
            warnings.push(msg);
        }
    }
    if config.backend == BackendKind::Mpi {
        for (_, sg) in model.synapse_groups() {
            let trg = model.neuron_group(sg.trg());
            if sg.host_id() != trg.host_id() {
                let msg = format!(
                    "synapse group '{}' runs on host {} but its target '{}' lives on host {}; its input does not reach the target",
                    sg.name(),
                    sg.host_id(),
                    trg.name(),
                    trg.host_id()
                );
                log::warn!("{msg}");
                warnings.push(msg);
            }
        }
    }
    warnings
}

/// Emit the simulation sources of a finalized model
pub fn generate(model: &ModelSpec, config: &GeneratorConfig) -> Result<GeneratedCode> {
    if !model.is_finalized() {
        return Err(CompilerError::NotFinalized(model.name().to_string()));
    }
    passes::ClusterPass {
        backend: config.backend,
    }
    .validate(model)?;

    let backend = backend::for_kind(config.backend);
    let cx = EmitContext::new(model, config);
    let warnings = collect_warnings(model, config);

    let mut files = BTreeMap::new();
    files.insert(
        definitions::FILE.to_string(),
        definitions::emit(&cx, backend.as_ref())?,
    );
    files.insert(
        neuron::FILE.to_string(),
        neuron::emit_file(&cx, backend.as_ref())?,
    );
    files.insert(
        synapse::FILE.to_string(),
        synapse::emit_file(&cx, backend.as_ref())?,
    );
    files.insert(
        runner::FILE.to_string(),
        runner::emit(&cx, backend.as_ref())?,
    );
    for (name, text) in backend.extra_files(&cx)? {
        files.insert(name, text);
    }
    log::info!(
        "generated {} files for '{}' ({} backend)",
        files.len(),
        model.name(),
        config.backend
    );
    Ok(GeneratedCode { files, warnings })
}

/// Finalize and generate in one go
pub fn compile_model(mut model: ModelSpec, config: &GeneratorConfig) -> Result<GeneratedCode> {
    finalize_model(&mut model, config)?;
    generate(&model, config)
}

/// Write a generated file set into `dir`, creating it if needed
pub fn write_output(code: &GeneratedCode, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(code.files.len());
    for (name, text) in &code.files {
        let path = dir.join(name);
        std::fs::write(&path, text)?;
        log::debug!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snnc_model::{builtin, SynapsePopulation};
    use std::sync::Arc;

    fn model() -> ModelSpec {
        let mut m = ModelSpec::new("lib");
        let izh = Arc::new(builtin::izhikevich());
        m.add_neuron_population("PN", 4, izh.clone(), vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
            .unwrap();
        m.add_neuron_population("KC", 4, izh, vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
            .unwrap();
        m
    }

    #[test]
    fn generate_requires_finalized_model() {
        let m = model();
        let err = generate(&m, &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, CompilerError::NotFinalized(_)));
    }

    #[test]
    fn unknown_presynaptic_variable_rejected() {
        let mut m = model();
        let wu = snnc_model::WeightUpdateModel::new("Bad").with_input("$(g) * $(W_pre)");
        m.add_synapse_population(SynapsePopulation::new(
            "PNKC",
            "PN",
            "KC",
            Arc::new(wu),
            Arc::new(builtin::delta_curr()),
        ))
        .unwrap();
        let err = finalize_model(&mut m, &GeneratorConfig::default()).unwrap_err();
        match err {
            CompilerError::InvalidReference { name, .. } => assert_eq!(name, "W_pre"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!m.is_finalized());
    }

    #[test]
    fn finalize_twice_is_a_no_op() {
        let mut m = model();
        let config = GeneratorConfig::default();
        finalize_model(&mut m, &config).unwrap();
        finalize_model(&mut m, &config).unwrap();
        assert!(m.is_finalized());
    }
}
