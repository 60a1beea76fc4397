//! Configuration management for the snnc CLI
//!
//! Settings come from `snnc.toml`: an explicit `--config` path, else one in
//! the working directory, else the user's config directory. Missing files
//! mean defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snnc_compiler::GeneratorConfig;

use crate::error::{CliError, CliResult};

/// Configuration file name
pub const CONFIG_FILE: &str = "snnc.toml";

/// Global CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Default logging level when neither `RUST_LOG` nor `--verbose` is given
    pub log_level: Option<String>,

    /// Directory generated code lands in when `generate` has no `-o`
    pub output_root: Option<PathBuf>,

    /// Generator settings
    pub generator: GeneratorConfig,
}

impl CliConfig {
    /// Load configuration from file; a missing file yields defaults
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| CliError::config(format!("Invalid config file {}: {}", path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::config("Could not determine config directory"))?;
        Ok(config_dir.join("snnc").join(CONFIG_FILE))
    }

    /// Resolve and load the configuration for this invocation.
    ///
    /// An explicit path must exist.
    pub fn resolve(explicit: Option<&Path>) -> CliResult<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(CliError::config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Self::load_from_file(path);
        }
        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            return Self::load_from_file(local);
        }
        match Self::default_config_path() {
            Ok(path) => Self::load_from_file(&path),
            Err(_) => Ok(Self::default()),
        }
    }
}
