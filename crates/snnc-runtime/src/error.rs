//! Error types for the snnc runtime

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while stepping or exchanging spikes
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Model layer error
    #[error("Model error: {source}")]
    Model {
        #[from]
        /// Source model error
        source: snnc_model::ModelError,
    },

    /// Invalid simulation configuration
    #[error("Invalid simulation configuration: {reason}")]
    InvalidConfiguration {
        /// Reason for invalid configuration
        reason: String,
    },

    /// Population not present in the context
    #[error("Population '{name}' not found")]
    PopulationNotFound {
        /// Requested population
        name: String,
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

    /// A spike transfer between hosts failed; the run cannot continue
    #[error("Spike transfer with tag {tag} from host {from} to host {to} failed: {reason}")]
    Transfer {
        /// Message tag
        tag: u32,
        /// Sending host
        from: u32,
        /// Receiving host
        to: u32,
        /// Reason for the failure
        reason: String,
    },
}

impl RuntimeError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

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

    /// Create a transfer error
    pub fn transfer(tag: u32, from: u32, to: u32, reason: impl Into<String>) -> Self {
        Self::Transfer {
            tag,
            from,
            to,
            reason: reason.into(),
        }
    }
}
