//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Aguardador: replay scripted UI timelines through Aguardar's locator
/// chains, waits and outcome classification
#[derive(Parser, Debug)]
#[command(name = "aguardador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a timeline file against a scripted UI
    Replay(ReplayArgs),

    /// Show the effective engine configuration
    Config(ConfigArgs),
}

/// Arguments for the replay command
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Timeline file (YAML)
    pub timeline: PathBuf,

    /// Engine configuration file (YAML)
    #[arg(short, long, env = "AGUARDAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the diagnostics output directory
    #[arg(long)]
    pub diagnostics_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Engine configuration file (YAML)
    #[arg(short, long, env = "AGUARDAR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Color output argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect terminal
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Report format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// One line per step
    #[default]
    Text,
    /// JSON report on stdout
    Json,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::try_parse_from([
            "aguardador",
            "-vv",
            "replay",
            "login.yaml",
            "--diagnostics-dir",
            "out",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Replay(args) = cli.command else {
            unreachable!("expected replay");
        };
        assert_eq!(args.timeline, PathBuf::from("login.yaml"));
        assert_eq!(args.diagnostics_dir, Some(PathBuf::from("out")));
        assert_eq!(args.format, FormatArg::Json);
    }

    #[test]
    fn test_replay_requires_timeline() {
        assert!(Cli::try_parse_from(["aguardador", "replay"]).is_err());
    }

    #[test]
    fn test_color_arg_conversion() {
        let choice: crate::config::ColorChoice = ColorArg::Never.into();
        assert_eq!(choice, crate::config::ColorChoice::Never);
    }
}
