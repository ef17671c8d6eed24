//! Aguardador CLI Library
//!
//! Command-line front end for the Aguardar engine: replay scripted UI
//! timelines and inspect the effective engine configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
mod output;
pub mod replay;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, FormatArg, ReplayArgs};
pub use config::{init_logging, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_json, render_step, Reporter};
pub use replay::{replay, ReplayReport, Step, StepOutcome, StepReport, Timeline};

use aguardar::EngineConfig;
use std::path::Path;

/// Load the engine configuration, falling back to defaults without a file
pub async fn load_engine_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path).await?),
        None => Ok(EngineConfig::default()),
    }
}
