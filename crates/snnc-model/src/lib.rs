#![doc = "snnc model graph - populations, projections and their planning state\n\nResponsibilities:\n- Model definitions (neuron, postsynaptic and weight-update models) holding code fragments with `$(name)` placeholders\n- Neuron/synapse group descriptors with delay-slot sizing, queue flags, zero-copy hints and cluster placement\n- Arena-backed model graph (`ModelSpec`) addressed by stable integer handles\n- Delay ring arithmetic shared by the code generator and the runtime\n- Cross-host spike exchange plan (tags, senders, receivers)\n\nThe graph is declared once, mutated by the planner passes in `snnc-compiler`, then frozen with\n`ModelSpec::mark_finalized` before any code is emitted.\n"]
#![warn(missing_docs)]

pub mod builtin;
pub mod code;
pub mod delay;
pub mod exchange;
pub mod model;
pub mod models;
pub mod neuron_group;
pub mod synapse_group;

pub use delay::DelayRing;
pub use exchange::{ExchangePlan, Role, SpikeKind, Transfer};
pub use model::{ModelSpec, NeuronGroupId, Precision, SynapseGroupId, SynapsePopulation};
pub use models::{DerivedParam, NeuronModel, PostsynapticModel, Var, WeightUpdateModel};
pub use neuron_group::{InputCurrent, NeuronGroup};
pub use synapse_group::{Connectivity, LearningBranch, PiecewiseRule, SynapseGroup, WeightStorage};

/// Model-wide result type
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while declaring or planning a model
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A group with this name already exists
    #[error("Duplicate {kind} group name '{name}'")]
    DuplicateName {
        /// "neuron" or "synapse"
        kind: &'static str,
        /// Offending name
        name: String,
    },

    /// Reference to a neuron group that was never declared
    #[error("Unknown neuron group '{0}'")]
    UnknownNeuronGroup(String),

    /// Wrong number of values supplied for a model's parameters or variables
    #[error("Group '{group}' expects {expected} {what} for model '{model}', got {found}")]
    ValueCount {
        /// Group name
        group: String,
        /// Model name
        model: String,
        /// "parameters", "initial values", ...
        what: &'static str,
        /// Declared count
        expected: usize,
        /// Supplied count
        found: usize,
    },

    /// Reference to a variable the model does not declare
    #[error("Group '{group}' has no variable '{var}'")]
    UnknownVariable {
        /// Group name
        group: String,
        /// Variable name
        var: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Connectivity / weight-storage / learning combination is not supported
    #[error("Synapse group '{group}': {reason}")]
    InvalidSynapseGroup {
        /// Group name
        group: String,
        /// Reason
        reason: String,
    },

    /// Derived parameters were requested twice
    #[error("Derived parameters of '{0}' already initialised")]
    DerivedParamsInitialized(String),

    /// The model is frozen; no further declarations or planning allowed
    #[error("Model '{0}' is finalized and can no longer be modified")]
    Finalized(String),
}

impl ModelError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create an invalid synapse group error
    pub fn invalid_synapse_group(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSynapseGroup {
            group: group.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_group() {
        let err = ModelError::UnknownVariable {
            group: "PN".into(),
            var: "W".into(),
        };
        assert_eq!(err.to_string(), "Group 'PN' has no variable 'W'");

        let err = ModelError::invalid_parameter("dt", "0", "> 0");
        assert!(matches!(err, ModelError::InvalidParameter { .. }));
    }
}
