//! Error handling for the snnc CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Model declaration error
    #[error("Model error: {0}")]
    Model(#[from] snnc_model::ModelError),

    /// Code generation error
    #[error("Generation error: {0}")]
    Compiler(#[from] snnc_compiler::CompilerError),

    /// Connectivity file error
    #[error("Storage error: {0}")]
    Storage(#[from] snnc_storage::StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model file could not be understood
    #[error("Model file {path}: {reason}")]
    ModelFile {
        /// File being read
        path: String,
        /// What went wrong
        reason: String,
    },

    /// A model file names a model that is not built in
    #[error("Unknown {kind} model '{name}' in group '{group}'")]
    UnknownModel {
        /// "neuron", "postsynaptic" or "weight update"
        kind: &'static str,
        /// Requested model name
        name: String,
        /// Group that asked for it
        group: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("Serialization error: {0}")]
    Serde(#[from] toml::de::Error),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a model file error
    pub fn model_file(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid arguments error
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }
}
