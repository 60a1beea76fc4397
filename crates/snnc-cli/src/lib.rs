//! snnc CLI crate
//!
//! Commands (see [commands]):
//! - generate: model file (TOML) → finalized model → generated C sources in an output directory
//! - inspect: planned model summary (delay slots, queued variables, exchange plan) as text or JSON
//! - sparse check|pack: validate or build the unframed connectivity files the generated loaders read
//!
//! The binary (src/main.rs) wires up logging, resolves `snnc.toml` and calls
//! [`SnncCli::execute`]; the modules are public so tests can drive them directly.

pub mod commands;
pub mod config;
pub mod error;
pub mod model_file;

pub use commands::SnncCli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
