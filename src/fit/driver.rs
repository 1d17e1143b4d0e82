//! Grouped, region-partitioned fitting.
//!
//! All checks run before the first batch is dispatched: config compatibility,
//! region resolution, exclusion of failed trials, free parameters, feature
//! extraction for the whole subset and grouping feasibility. Only then are
//! groups turned into [`TrainingBatch`]es and handed to the trainer, in order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::domain::{
    Dataset, ObservableCurve, ObservationConfig, ParamName, ParamSpec, SamplerConfig,
    SimulationTrial,
};
use crate::error::{ConfigError, FittingError};
use crate::fit::features::{FeatureOptions, extract_features, extract_labels, feature_len};
use crate::fit::grouping::{Grouping, form_groups};
use crate::fit::region::{PartitionScheme, Region, select};
use crate::fit::trainer::{LinearModel, RegressionTrainer, TrainedArtifact, TrainingBatch};
use crate::io::ModelStore;

/// The generation setup a model expects its training data to come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedConfig {
    pub erosion_enabled: bool,
    pub fixed: BTreeSet<ParamName>,
}

impl ExpectedConfig {
    /// From the positional fixed-flag vector used on the command line.
    pub fn from_flags(erosion_enabled: bool, flags: &[bool]) -> Result<Self, ConfigError> {
        if flags.len() != ParamName::COUNT {
            return Err(ConfigError::FlagCount {
                expected: ParamName::COUNT,
                actual: flags.len(),
            });
        }
        let fixed = ParamName::ALL
            .into_iter()
            .zip(flags)
            .filter_map(|(name, &f)| f.then_some(name))
            .collect();
        Ok(Self {
            erosion_enabled,
            fixed,
        })
    }

    /// Human-readable difference to `config`, if any.
    ///
    /// Erosion-only parameters are ignored in the fixed sets when erosion is
    /// off on both sides, since they are inert anyway.
    pub fn mismatch(&self, config: &SamplerConfig) -> Option<String> {
        if self.erosion_enabled != config.erosion_enabled {
            return Some(format!(
                "erosion is {} in the dataset but {} was expected",
                on_off(config.erosion_enabled),
                on_off(self.erosion_enabled)
            ));
        }
        let relevant = |name: &ParamName| self.erosion_enabled || !name.is_erosion();
        let expected: BTreeSet<_> = self.fixed.iter().copied().filter(relevant).collect();
        let actual: BTreeSet<_> = config.fixed_set().into_iter().filter(relevant).collect();
        if expected == actual {
            return None;
        }
        let list = |set: &BTreeSet<ParamName>| {
            set.iter().map(|p| p.key()).collect::<Vec<_>>().join(", ")
        };
        Some(format!(
            "fixed parameters are [{}] in the dataset but [{}] were expected",
            list(&actual),
            list(&expected)
        ))
    }
}

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitRequest {
    pub model_name: String,
    pub grouping: Grouping,
    pub region: Region,
    pub scheme: PartitionScheme,
    pub expected: Option<ExpectedConfig>,
    pub allow_mismatch: bool,
    /// Seeds group shuffling.
    pub seed: u64,
    pub features: FeatureOptions,
}

impl FitRequest {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            grouping: Grouping::default(),
            region: Region::Full,
            scheme: PartitionScheme::default(),
            expected: None,
            allow_mismatch: false,
            seed: 42,
            features: FeatureOptions::default(),
        }
    }
}

/// A trained model plus everything needed to apply it to new curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub name: String,
    pub region: Region,
    pub scheme: PartitionScheme,
    /// Priors of the learned outputs, in output order.
    pub labels: Vec<ParamSpec>,
    /// Sampler the training data was generated with.
    pub sampler: SamplerConfig,
    pub observation: ObservationConfig,
    pub feature_len: usize,
    /// Successful trials in the training subset.
    pub trials_used: usize,
    pub batches_dispatched: usize,
    pub stopped_early: bool,
    pub trained_at: DateTime<Utc>,
    pub artifact: TrainedArtifact,
}

impl FittedModel {
    /// Estimate the learned parameters from a curve.
    ///
    /// Only `"linear"` artifacts can be evaluated in-process.
    pub fn predict(&self, curve: &ObservableCurve) -> Result<Vec<(ParamName, f64)>, FittingError> {
        let model = LinearModel::from_artifact(&self.artifact)?;
        let features = extract_features(
            curve,
            &self.observation,
            &self.sampler,
            &FeatureOptions::default(),
            0,
        )?;
        let outputs = model
            .predict(&features)
            .filter(|o| o.len() == self.labels.len())
            .ok_or_else(|| {
                FittingError::UnsupportedArtifact(format!(
                    "{} (shape does not match {} features / {} labels)",
                    self.artifact.kind,
                    features.len(),
                    self.labels.len()
                ))
            })?;
        Ok(self
            .labels
            .iter()
            .zip(outputs)
            .map(|(spec, unit)| (spec.name, spec.denormalize(unit)))
            .collect())
    }
}

/// Runs one [`FitRequest`] against datasets and trainers.
#[derive(Debug, Clone)]
pub struct FitDriver {
    request: FitRequest,
    cancel: CancelToken,
}

impl FitDriver {
    pub fn new(request: FitRequest) -> Self {
        Self {
            request,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn request(&self) -> &FitRequest {
        &self.request
    }

    pub fn fit<T: RegressionTrainer>(
        &self,
        dataset: &Dataset,
        mut trainer: T,
    ) -> Result<FittedModel, FittingError> {
        let req = &self.request;
        let config = dataset.config();
        let sampler = &config.sampler;
        let obs = &config.observation;

        if let Some(expected) = &req.expected {
            if let Some(diff) = expected.mismatch(sampler) {
                if !req.allow_mismatch {
                    return Err(FittingError::ConfigMismatch(diff));
                }
                warn!(%diff, "training on a dataset with a different config");
            }
        }

        let subset = select(dataset, &req.scheme, req.region)?;
        let usable: Vec<&SimulationTrial> = subset
            .into_iter()
            .filter(|t| t.is_success() && t.curve.is_some())
            .collect();
        if usable.is_empty() {
            return Err(FittingError::EmptySubset { region: req.region });
        }

        let free = sampler.free_params();
        if free.is_empty() {
            return Err(FittingError::NoFreeParameters);
        }

        let (rows, rejected) = extract_rows(&usable, sampler, obs, &free, &req.features);
        if let Some(first) = rejected.first() {
            warn!(
                skipped = rejected.len(),
                first = %first,
                "excluding successful trials whose curves yield no features"
            );
        }
        if rows.is_empty() {
            return Err(FittingError::EmptySubset { region: req.region });
        }

        let mut rng = StdRng::seed_from_u64(req.seed);
        let groups = form_groups(rows.len(), &req.grouping, &mut rng)?;

        info!(
            model = %req.model_name,
            region = %req.region,
            trials = rows.len(),
            labels = free.len(),
            groups = groups.len(),
            "fitting"
        );

        let mut dispatched = 0usize;
        let mut stopped_early = false;
        for (i, group) in groups.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(FittingError::Cancelled { batches: dispatched });
            }
            let batch = build_batch(group, &rows);
            let report = trainer.train_batch(&batch)?;
            dispatched += 1;
            debug!(batch = i, rows = batch.len(), loss = ?report.loss, "batch trained");

            if report.converged {
                stopped_early = dispatched < groups.len();
                break;
            }
        }

        let artifact = trainer.finish()?;
        info!(batches = dispatched, stopped_early, kind = %artifact.kind, "fit finished");

        Ok(FittedModel {
            name: req.model_name.clone(),
            region: req.region,
            scheme: req.scheme,
            labels: free
                .iter()
                .filter_map(|&name| sampler.spec(name).cloned())
                .collect(),
            sampler: sampler.clone(),
            observation: obs.clone(),
            feature_len: feature_len(obs),
            trials_used: rows.len(),
            batches_dispatched: dispatched,
            stopped_early,
            trained_at: Utc::now(),
            artifact,
        })
    }

    /// Fit, then persist the model under `(model_name, region)`.
    pub fn fit_to_store<T: RegressionTrainer>(
        &self,
        dataset: &Dataset,
        trainer: T,
        store: &ModelStore,
    ) -> Result<(FittedModel, PathBuf), FittingError> {
        let model = self.fit(dataset, trainer)?;
        let path = store.save(&model)?;
        Ok((model, path))
    }

    /// Fit every region of the request's layout in parallel, one trainer per
    /// region from `factory`.
    pub fn fit_regions<T, F>(
        &self,
        dataset: &Dataset,
        factory: F,
    ) -> BTreeMap<Region, Result<FittedModel, FittingError>>
    where
        T: RegressionTrainer,
        F: Fn(Region) -> T + Sync,
    {
        self.request
            .scheme
            .layout
            .regions()
            .par_iter()
            .map(|&region| {
                let driver = FitDriver {
                    request: FitRequest {
                        region,
                        ..self.request.clone()
                    },
                    cancel: self.cancel.clone(),
                };
                (region, driver.fit(dataset, factory(region)))
            })
            .collect()
    }
}

/// Features and labels of one usable trial.
struct Row {
    id: u64,
    features: Vec<f64>,
    labels: Vec<f64>,
}

/// Extract every row up front, in trial order. Trials whose features cannot
/// be built are returned as errors instead.
fn extract_rows(
    usable: &[&SimulationTrial],
    sampler: &SamplerConfig,
    obs: &ObservationConfig,
    free: &[ParamName],
    options: &FeatureOptions,
) -> (Vec<Row>, Vec<FittingError>) {
    let results: Vec<Result<Row, FittingError>> = usable
        .par_iter()
        .map(|trial| {
            let curve = trial.curve.as_ref().ok_or_else(|| FittingError::Features {
                trial: trial.id,
                reason: "successful trial without a curve".to_string(),
            })?;
            Ok(Row {
                id: trial.id,
                features: extract_features(curve, obs, sampler, options, trial.id)?,
                labels: extract_labels(&trial.params, sampler, free),
            })
        })
        .collect();

    let mut rows = Vec::with_capacity(results.len());
    let mut rejected = Vec::new();
    for result in results {
        match result {
            Ok(row) => rows.push(row),
            Err(err) => rejected.push(err),
        }
    }
    (rows, rejected)
}

fn build_batch(group: &[usize], rows: &[Row]) -> TrainingBatch {
    let mut batch = TrainingBatch {
        trial_ids: Vec::with_capacity(group.len()),
        features: Vec::with_capacity(group.len()),
        labels: Vec::with_capacity(group.len()),
    };
    for &idx in group {
        let row = &rows[idx];
        batch.trial_ids.push(row.id);
        batch.features.push(row.features.clone());
        batch.labels.push(row.labels.clone());
    }
    batch
}
