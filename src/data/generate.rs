//! Monte Carlo dataset generation.
//!
//! Attempt `k` draws its parameters from its own RNG, seeded with
//! `split_seed(master_seed, k)`, so the dataset depends only on the config and
//! never on the number of workers or their scheduling.
//!
//! Work proceeds in rounds. Each round attempts exactly the number of
//! successes still missing, in parallel, and results are collected in attempt
//! order. Generation stops when enough trials succeeded or when the attempt
//! budget (`sample_count × retry_factor`) is spent.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::data::sampler::{Sampler, split_seed};
use crate::domain::{Dataset, GenerationConfig, SimulationTrial, TrialStatus};
use crate::error::{ConfigError, GenerationError, SimulationError};
use crate::models::TrajectoryModel;

/// Runtime knobs that do not affect the generated data.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Worker threads; `None` uses rayon's default.
    pub workers: Option<usize>,
    pub cancel: CancelToken,
}

/// Failure tally of one round, for logging.
#[derive(Debug, Default)]
struct FailureCounts {
    no_signal: usize,
    timeout: usize,
    divergence: usize,
}

impl FailureCounts {
    fn record(&mut self, err: &SimulationError) {
        match err {
            SimulationError::NoSignal { .. } => self.no_signal += 1,
            SimulationError::Timeout { .. } => self.timeout += 1,
            SimulationError::Divergence { .. } => self.divergence += 1,
        }
    }
}

/// Generate `config.sample_count` successful trials.
///
/// Returns a complete dataset or an error; never a short dataset.
pub fn generate<M>(
    model: &M,
    config: &GenerationConfig,
    options: &GenerateOptions,
) -> Result<Dataset, GenerationError>
where
    M: TrajectoryModel + ?Sized,
{
    if config.sample_count == 0 {
        return Err(ConfigError::InvalidSetting {
            field: "sample_count",
            reason: "must be at least 1".to_string(),
        }
        .into());
    }
    if config.retry_factor == 0 {
        return Err(ConfigError::InvalidSetting {
            field: "retry_factor",
            reason: "must be at least 1".to_string(),
        }
        .into());
    }
    let sampler = Sampler::new(config.sampler.clone())?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.unwrap_or(0))
        .build()
        .map_err(|e| GenerationError::Pool(e.to_string()))?;

    let requested = config.sample_count;
    let max_attempts = requested.saturating_mul(config.retry_factor);
    let erosion_enabled = config.sampler.erosion_enabled;

    info!(
        requested,
        max_attempts,
        workers = pool.current_num_threads(),
        erosion_enabled,
        seed = config.master_seed,
        "generating dataset"
    );

    let mut dataset = Dataset::new(config.clone());
    let mut produced = 0usize;
    let mut attempts = 0usize;
    let mut round = 0usize;

    while produced < requested && attempts < max_attempts {
        if options.cancel.is_cancelled() {
            return Err(GenerationError::Cancelled { attempts });
        }

        let batch = (requested - produced).min(max_attempts - attempts);

        let outcomes: Vec<Option<SimulationTrial>> = pool.install(|| {
            (attempts..attempts + batch)
                .into_par_iter()
                .map(|k| {
                    if options.cancel.is_cancelled() {
                        return None;
                    }
                    let id = k as u64;
                    Some(run_attempt(model, &sampler, config.master_seed, id, erosion_enabled))
                })
                .collect()
        });

        if options.cancel.is_cancelled() {
            let finished = outcomes.iter().flatten().count();
            return Err(GenerationError::Cancelled {
                attempts: attempts + finished,
            });
        }

        let mut failures = FailureCounts::default();
        for trial in outcomes.into_iter().flatten() {
            match &trial.status {
                TrialStatus::Success => {
                    produced += 1;
                    dataset.append(trial);
                }
                TrialStatus::Failed(err) => {
                    failures.record(err);
                    if config.keep_failed {
                        dataset.append(trial);
                    }
                }
            }
        }
        attempts += batch;
        round += 1;

        debug!(
            round,
            attempted = batch,
            produced,
            requested,
            no_signal = failures.no_signal,
            timeout = failures.timeout,
            divergence = failures.divergence,
            "generation round finished"
        );
    }

    if produced < requested {
        return Err(GenerationError::InsufficientYield {
            requested,
            produced,
            attempts,
        });
    }

    dataset.meta.attempts = attempts;
    info!(produced, attempts, rounds = round, "dataset complete");
    Ok(dataset)
}

fn run_attempt<M>(
    model: &M,
    sampler: &Sampler,
    master_seed: u64,
    id: u64,
    erosion_enabled: bool,
) -> SimulationTrial
where
    M: TrajectoryModel + ?Sized,
{
    let mut rng = StdRng::seed_from_u64(split_seed(master_seed, id));
    let params = sampler.draw(&mut rng);
    match model.simulate(&params, erosion_enabled) {
        Ok(curve) => SimulationTrial {
            id,
            params,
            curve: Some(curve),
            status: TrialStatus::Success,
        },
        Err(err) => SimulationTrial {
            id,
            params,
            curve: None,
            status: TrialStatus::Failed(err),
        },
    }
}
