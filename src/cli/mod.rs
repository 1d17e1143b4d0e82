//! Command-line parsing for the meteor simulation and fitting tool.
//!
//! Argument parsing and command dispatch stay separate from the physics and
//! fitting code; `app` turns these structs into library calls.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::ParamName;
use crate::fit::region::Layout;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "metsim",
    version,
    about = "Meteoroid ablation simulator and parameter-recovery fitter"
)]
pub struct Cli {
    /// Log filter (e.g. `info`, `metsim_ml=debug`); overrides METSIM_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate a Monte Carlo dataset of light curves and save it as JSON.
    Generate(GenerateArgs),
    /// Fit a regression model on a dataset (optionally one region of interest).
    Fit(FitArgs),
    /// Evaluate a saved model against the ground truth of a dataset.
    Predict(PredictArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Toggle::On
    }
}

#[derive(Debug, Parser, Clone)]
pub struct GenerateArgs {
    /// Dataset file to write.
    pub output: PathBuf,

    /// Number of successful trials to produce.
    pub sim_num: usize,

    /// Simulate without erosion (erosion parameters become inert).
    #[arg(long)]
    pub noerosion: bool,

    /// Ten booleans, one per parameter in canonical order; `true` keeps it fixed.
    #[arg(long, num_args = 10, value_parser = parse_flag, value_name = "BOOL")]
    pub fixed: Option<Vec<bool>>,

    /// Master seed (else METSIM_SEED, else the preset's seed).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (else METSIM_WORKERS, else one per core).
    #[arg(long)]
    pub workers: Option<usize>,

    /// JSON generation preset; flags override its fields.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Also store failed attempts in the dataset.
    #[arg(long)]
    pub keep_failed: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Dataset file produced by `metsim generate`.
    pub dataset: PathBuf,

    /// Directory where fitted models are stored.
    pub model_dir: PathBuf,

    /// Model name; files are `<name>.json` or `<name>_roi<k>.json`.
    pub model_name: String,

    /// Trials per training group.
    #[arg(long, default_value_t = 256)]
    pub group_size: usize,

    /// Number of training groups.
    #[arg(long, default_value_t = 50)]
    pub group_count: usize,

    /// Region code: -1 full dataset, 0 lower-left, 1 lower-right, 2 bottom half,
    /// 3 upper-left, 4 upper-right, 5 top half.
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub roi: i32,

    /// Region layout used with `--all-regions`.
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,

    /// Parameter on the horizontal partition axis.
    #[arg(long, value_enum, default_value = "rho")]
    pub roi_x: ParamName,

    /// Parameter on the vertical partition axis.
    #[arg(long, value_enum, default_value = "sigma")]
    pub roi_y: ParamName,

    /// Reshuffle and reuse trials when the groups need more than the subset holds.
    #[arg(long)]
    pub reshuffle: bool,

    /// Seed for group formation and feature noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Erosion setting the dataset is expected to have.
    #[arg(long, value_enum)]
    pub expect_erosion: Option<Toggle>,

    /// Fixed flags the dataset is expected to have (ten booleans).
    #[arg(long, num_args = 10, value_parser = parse_flag, value_name = "BOOL")]
    pub expect_fixed: Option<Vec<bool>>,

    /// Warn instead of failing when the dataset differs from the expectation.
    #[arg(long)]
    pub allow_mismatch: bool,

    /// Ridge penalty for the linear trainer.
    #[arg(long, default_value_t = 1e-6)]
    pub ridge: f64,

    /// Fit one model per region of the layout, in parallel.
    #[arg(long)]
    pub all_regions: bool,

    /// Add observation noise to the features.
    #[arg(long)]
    pub noise: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    /// Model file written by `metsim fit`.
    pub model: PathBuf,

    /// Dataset with ground truth.
    pub dataset: PathBuf,

    /// Maximum number of trials to evaluate.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// Accepts `true/false`, `1/0`, `yes/no` in any case.
pub fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "t" | "y" => Ok(true),
        "false" | "0" | "no" | "f" | "n" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_with_fixed_flags() {
        let cli = Cli::try_parse_from([
            "metsim", "generate", "out.json", "100", "--noerosion", "--fixed", "true", "false",
            "True", "0", "1", "no", "yes", "F", "t", "false", "--seed", "7",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.sim_num, 100);
        assert!(args.noerosion);
        assert_eq!(
            args.fixed.unwrap(),
            vec![true, false, true, false, true, false, true, false, true, false]
        );
        assert_eq!(args.seed, Some(7));
    }

    #[test]
    fn parses_fit_defaults_and_negative_roi() {
        let cli = Cli::try_parse_from(["metsim", "fit", "d.json", "models", "m", "--roi", "-1"])
            .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.roi, -1);
        assert_eq!((args.group_size, args.group_count), (256, 50));
        assert_eq!((args.roi_x, args.roi_y), (ParamName::Rho, ParamName::Sigma));
        assert!(args.expect_erosion.is_none());

        let cli = Cli::try_parse_from([
            "metsim", "--log-level", "debug", "fit", "d.json", "models", "m", "--roi", "2",
            "--roi-x", "v_init", "--expect-erosion", "off", "--reshuffle",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.roi, 2);
        assert_eq!(args.roi_x, ParamName::VInit);
        assert_eq!(args.expect_erosion, Some(Toggle::Off));
        assert!(args.reshuffle);
    }

    #[test]
    fn fixed_requires_ten_values() {
        assert!(
            Cli::try_parse_from(["metsim", "generate", "o.json", "5", "--fixed", "true", "false"])
                .is_err()
        );
        assert!(parse_flag("maybe").is_err());
    }
}
