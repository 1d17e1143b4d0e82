//! Shared workflow behind the CLI commands.
//!
//! generate: preset + flags -> config -> Monte Carlo run -> dataset file
//! fit:      dataset file -> request -> driver (one region or all) -> model files
//! predict:  model file + dataset file -> estimates against ground truth
//!
//! The CLI layer only prints what these functions return.

use std::path::PathBuf;

use tracing::info;

use crate::cli::{FitArgs, GenerateArgs, PredictArgs};
use crate::config::{Settings, load_generation_preset};
use crate::data::{GenerateOptions, generate};
use crate::domain::{Dataset, GenerationConfig, ParamName, SamplerConfig};
use crate::error::{AppError, ConfigError, FittingError};
use crate::fit::driver::{ExpectedConfig, FitDriver, FitRequest, FittedModel};
use crate::fit::features::FeatureOptions;
use crate::fit::grouping::{Grouping, Repeat};
use crate::fit::region::{Layout, PartitionScheme, Region};
use crate::fit::trainer::LinearTrainer;
use crate::io::{ModelStore, check_model_name, load_model, read_dataset, write_dataset};
use crate::models::AblationModel;
use crate::report::{PredictionRow, compute_predictions};

/// Result of fitting one region.
#[derive(Debug)]
pub struct RegionOutcome {
    pub region: Region,
    pub result: Result<(FittedModel, PathBuf), FittingError>,
}

/// Preset (or defaults) with the command-line overrides applied.
pub fn generation_config(
    args: &GenerateArgs,
    settings: &Settings,
) -> Result<GenerationConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => load_generation_preset(path)?,
        None => GenerationConfig::default(),
    };

    config.sample_count = args.sim_num;
    if args.noerosion {
        config.sampler.erosion_enabled = false;
    }
    if let Some(flags) = &args.fixed {
        config.sampler = config.sampler.with_fixed_flags(flags)?;
    }
    if let Some(seed) = args.seed.or(settings.seed) {
        config.master_seed = seed;
    }
    if args.keep_failed {
        config.keep_failed = true;
    }
    Ok(config)
}

/// Generate a dataset and commit it to `args.output`.
pub fn run_generate(args: &GenerateArgs, settings: &Settings) -> Result<Dataset, AppError> {
    let config = generation_config(args, settings)?;
    let model = AblationModel::new(config.physics.clone(), config.observation.clone())?;
    let options = GenerateOptions {
        workers: args.workers.or(settings.workers),
        ..GenerateOptions::default()
    };

    let dataset = generate(&model, &config, &options)?;
    write_dataset(&args.output, &dataset)?;
    Ok(dataset)
}

/// Translate the fit flags into a request for `sampler`'s dataset.
pub fn fit_request(args: &FitArgs, sampler: &SamplerConfig) -> Result<FitRequest, AppError> {
    let region = Region::from_code(args.roi)?;
    let layout = match (args.all_regions, args.layout) {
        (_, Some(layout)) => layout,
        (true, None) if region == Region::Full => Layout::Quadrants,
        _ => region.layout(),
    };

    Ok(FitRequest {
        grouping: Grouping {
            batch_size: args.group_size,
            batch_count: args.group_count,
            repeat: if args.reshuffle {
                Repeat::Reshuffle
            } else {
                Repeat::Never
            },
        },
        region,
        scheme: PartitionScheme {
            x: args.roi_x,
            y: args.roi_y,
            layout,
        },
        expected: expected_config(args, sampler)?,
        allow_mismatch: args.allow_mismatch,
        seed: args.seed,
        features: FeatureOptions {
            noise: args.noise,
            seed: args.seed,
        },
        ..FitRequest::new(args.model_name.clone())
    })
}

/// Expectation from `--expect-erosion` / `--expect-fixed`; whichever is
/// missing is taken from the dataset.
fn expected_config(
    args: &FitArgs,
    sampler: &SamplerConfig,
) -> Result<Option<ExpectedConfig>, ConfigError> {
    if args.expect_erosion.is_none() && args.expect_fixed.is_none() {
        return Ok(None);
    }
    let erosion = args
        .expect_erosion
        .map_or(sampler.erosion_enabled, |t| t.is_on());
    let flags: Vec<bool> = match &args.expect_fixed {
        Some(flags) => flags.clone(),
        None => {
            let fixed = sampler.fixed_set();
            ParamName::ALL.iter().map(|p| fixed.contains(p)).collect()
        }
    };
    ExpectedConfig::from_flags(erosion, &flags).map(Some)
}

/// Fit one region, or every region of the layout with `--all-regions`, and
/// store the models.
pub fn run_fit(args: &FitArgs) -> Result<Vec<RegionOutcome>, AppError> {
    check_model_name(&args.model_name)?;
    let dataset = read_dataset(&args.dataset)?;
    let request = fit_request(args, &dataset.config().sampler)?;
    let store = ModelStore::new(&args.model_dir);
    let driver = FitDriver::new(request);
    let ridge = args.ridge;

    if !args.all_regions {
        let region = driver.request().region;
        let result = driver.fit_to_store(&dataset, LinearTrainer::new(ridge), &store);
        return Ok(vec![RegionOutcome { region, result }]);
    }

    let fitted = driver.fit_regions(&dataset, |_| LinearTrainer::new(ridge));
    info!(regions = fitted.len(), "all regions fitted");
    Ok(fitted
        .into_iter()
        .map(|(region, result)| RegionOutcome {
            region,
            result: result.and_then(|model| {
                let path = store.save(&model)?;
                Ok((model, path))
            }),
        })
        .collect())
}

/// Load a model and evaluate it on the dataset's successful trials.
pub fn run_predict(args: &PredictArgs) -> Result<(FittedModel, Vec<PredictionRow>), AppError> {
    let model = load_model(&args.model)?;
    let dataset = read_dataset(&args.dataset)?;
    let rows = compute_predictions(&model, &dataset, args.limit)?;
    Ok((model, rows))
}
