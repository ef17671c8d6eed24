//! Aguardador: replay scripted UI timelines through the Aguardar engine
//!
//! ## Usage
//!
//! ```bash
//! aguardador replay login.yaml                        # Replay a timeline
//! aguardador replay login.yaml --config fast.yaml     # With a custom engine config
//! aguardador replay login.yaml --format json          # Machine-readable report
//! aguardador config                                   # Print effective config
//! ```

use aguardador::{
    init_logging, load_engine_config, render_json, replay, Cli, CliConfig, CliError, CliResult,
    ColorChoice, Commands, ConfigArgs, FormatArg, ReplayArgs, Reporter, StepOutcome, Timeline,
    Verbosity,
};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_logging(&config);

    match cli.command {
        Commands::Replay(args) => run_replay(&config, &args).await,
        Commands::Config(args) => run_config(&args).await,
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

async fn run_replay(config: &CliConfig, args: &ReplayArgs) -> CliResult<()> {
    let mut engine = load_engine_config(args.config.as_deref()).await?;
    if let Some(ref dir) = args.diagnostics_dir {
        engine.diagnostics_dir.clone_from(dir);
    }
    let timeline = Timeline::load(&args.timeline).await?;

    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    if args.format == FormatArg::Text {
        reporter.header(&format!("Replaying {}", timeline.name));
    }

    let report = replay(&timeline, engine).await;

    match args.format {
        FormatArg::Text => {
            for step in &report.steps {
                reporter.step(step);
            }
            reporter.summary(&report);
        }
        FormatArg::Json => println!("{}", render_json(&report)?),
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::StepsFailed {
            failed: report.count(StepOutcome::Failed),
            total: report.steps.len(),
        })
    }
}

async fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let engine = load_engine_config(args.config.as_deref()).await?;
    print!("{}", engine.to_yaml()?);
    Ok(())
}
