//! Reporting utilities: terminal summaries of generation, fitting and prediction.

pub mod format;

pub use format::*;

use crate::domain::Dataset;
use crate::error::FittingError;
use crate::fit::driver::FittedModel;

/// Evaluate `model` on up to `limit` successful trials of `dataset`.
pub fn compute_predictions(
    model: &FittedModel,
    dataset: &Dataset,
    limit: usize,
) -> Result<Vec<PredictionRow>, FittingError> {
    let mut rows = Vec::new();
    for trial in dataset.successes().take(limit) {
        let Some(curve) = trial.curve.as_ref() else {
            continue;
        };
        let estimates = model.predict(curve)?;
        rows.push(PredictionRow {
            trial_id: trial.id,
            values: estimates
                .into_iter()
                .map(|(name, est)| (name, est, trial.params.get(name)))
                .collect(),
        });
    }
    Ok(rows)
}
