//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and environment settings
//! - installs the log subscriber
//! - runs generation, fitting or prediction
//! - prints reports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FitArgs, GenerateArgs, PredictArgs};
use crate::config::Settings;
use crate::error::{AppError, EXIT_CONFIG};

pub mod pipeline;

/// Entry point for the `metsim` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    let settings = Settings::from_env()?;
    init_logging(cli.log_level.as_deref(), &settings)?;

    match cli.command {
        Command::Generate(args) => handle_generate(args, &settings),
        Command::Fit(args) => handle_fit(args),
        Command::Predict(args) => handle_predict(args),
    }
}

/// Filter precedence: `--log-level`, then `METSIM_LOG`, then `info`.
/// Logs go to stderr; stdout carries the reports.
fn init_logging(cli_level: Option<&str>, settings: &Settings) -> Result<(), AppError> {
    let directive = cli_level.or(settings.log.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_new(directive)
        .map_err(|e| AppError::new(EXIT_CONFIG, format!("invalid log filter '{directive}': {e}")))?;
    // A subscriber may already be installed (tests); keep it.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
    Ok(())
}

fn handle_generate(args: GenerateArgs, settings: &Settings) -> Result<(), AppError> {
    let dataset = pipeline::run_generate(&args, settings)?;
    println!(
        "{}",
        crate::report::format_generation_summary(&dataset, Some(&args.output))
    );
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let outcomes = pipeline::run_fit(&args)?;

    let mut first_error: Option<AppError> = None;
    for outcome in outcomes {
        match outcome.result {
            Ok((model, path)) => {
                println!("{}", crate::report::format_fit_summary(&model, Some(&path)));
            }
            Err(err) => {
                println!("{}", crate::report::format_fit_failure(&outcome.region, &err));
                first_error.get_or_insert(AppError::from(err));
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let (model, rows) = pipeline::run_predict(&args)?;
    println!("{}", crate::report::format_fit_summary(&model, Some(&args.model)));
    println!("{}", crate::report::format_predictions(&rows));
    Ok(())
}
