//! Trainer seam and the reference linear trainer.
//!
//! The fitting driver only talks to [`RegressionTrainer`]. Any learner that
//! can consume batches of `(features, labels)` rows and finally produce a
//! serializable artifact can be plugged in.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{FittingError, TrainerError};
use crate::math::solve_least_squares;

/// One group of rows handed to the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingBatch {
    pub trial_ids: Vec<u64>,
    /// One feature vector per trial, all of the same length.
    pub features: Vec<Vec<f64>>,
    /// One normalized label vector per trial.
    pub labels: Vec<Vec<f64>>,
}

impl TrainingBatch {
    pub fn len(&self) -> usize {
        self.trial_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trial_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchReport {
    pub loss: Option<f64>,
    /// Ask the driver to stop dispatching further batches.
    pub converged: bool,
}

/// Trainer output. `payload` is opaque to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub kind: String,
    pub payload: serde_json::Value,
}

pub trait RegressionTrainer {
    fn train_batch(&mut self, batch: &TrainingBatch) -> Result<BatchReport, TrainerError>;

    fn finish(self) -> Result<TrainedArtifact, TrainerError>;
}

pub const LINEAR_KIND: &str = "linear";

/// Ridge-regularized linear least squares over all batches.
///
/// Batches only accumulate the normal equations `XᵀX` and `XᵀY` (with an
/// intercept column); the solve happens once in `finish`.
#[derive(Debug, Clone)]
pub struct LinearTrainer {
    ridge: f64,
    xtx: Option<DMatrix<f64>>,
    xty: Option<DMatrix<f64>>,
    rows: usize,
}

impl LinearTrainer {
    pub fn new(ridge: f64) -> Self {
        Self {
            ridge: ridge.max(0.0),
            xtx: None,
            xty: None,
            rows: 0,
        }
    }

    pub fn rows_seen(&self) -> usize {
        self.rows
    }
}

impl Default for LinearTrainer {
    fn default() -> Self {
        Self::new(1e-6)
    }
}

impl RegressionTrainer for LinearTrainer {
    fn train_batch(&mut self, batch: &TrainingBatch) -> Result<BatchReport, TrainerError> {
        let (Some(f0), Some(l0)) = (batch.features.first(), batch.labels.first()) else {
            return Err(TrainerError("empty batch".to_string()));
        };
        if batch.features.len() != batch.labels.len() {
            return Err(TrainerError(format!(
                "{} feature rows but {} label rows",
                batch.features.len(),
                batch.labels.len()
            )));
        }
        let p = f0.len() + 1;
        let k = l0.len();
        if let Some(xtx) = &self.xtx {
            if xtx.nrows() != p {
                return Err(TrainerError(format!(
                    "feature length changed from {} to {}",
                    xtx.nrows() - 1,
                    p - 1
                )));
            }
        }
        if let Some(xty) = &self.xty {
            if xty.ncols() != k {
                return Err(TrainerError(format!(
                    "label length changed from {} to {k}",
                    xty.ncols()
                )));
            }
        }

        let m = batch.features.len();
        let mut x = DMatrix::<f64>::zeros(m, p);
        let mut y = DMatrix::<f64>::zeros(m, k);
        for (i, (f, l)) in batch.features.iter().zip(&batch.labels).enumerate() {
            if f.len() + 1 != p || l.len() != k {
                return Err(TrainerError(format!("ragged row {i} in batch")));
            }
            x[(i, 0)] = 1.0;
            for (j, v) in f.iter().enumerate() {
                x[(i, j + 1)] = *v;
            }
            for (j, v) in l.iter().enumerate() {
                y[(i, j)] = *v;
            }
        }

        let xtx = x.tr_mul(&x);
        let xty = x.tr_mul(&y);
        self.xtx = Some(match self.xtx.take() {
            Some(acc) => acc + xtx,
            None => xtx,
        });
        self.xty = Some(match self.xty.take() {
            Some(acc) => acc + xty,
            None => xty,
        });
        self.rows += m;

        Ok(BatchReport::default())
    }

    fn finish(self) -> Result<TrainedArtifact, TrainerError> {
        let (Some(mut xtx), Some(xty)) = (self.xtx, self.xty) else {
            return Err(TrainerError("no batches were trained".to_string()));
        };
        // The intercept is not regularized.
        for i in 1..xtx.nrows() {
            xtx[(i, i)] += self.ridge;
        }
        let beta = solve_least_squares(&xtx, &xty)
            .ok_or_else(|| TrainerError("normal equations are too ill-conditioned".to_string()))?;

        let model = LinearModel {
            n_features: beta.nrows() - 1,
            n_labels: beta.ncols(),
            rows_trained: self.rows,
            coefficients: (0..beta.nrows())
                .map(|i| beta.row(i).iter().copied().collect())
                .collect(),
        };
        let payload =
            serde_json::to_value(&model).map_err(|e| TrainerError(format!("serialize model: {e}")))?;
        Ok(TrainedArtifact {
            kind: LINEAR_KIND.to_string(),
            payload,
        })
    }
}

/// Payload of a `"linear"` artifact: `labels = B₀ + Σ features_j · B_j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub n_features: usize,
    pub n_labels: usize,
    pub rows_trained: usize,
    /// `n_features + 1` rows (intercept first), `n_labels` columns.
    pub coefficients: Vec<Vec<f64>>,
}

impl LinearModel {
    pub fn from_artifact(artifact: &TrainedArtifact) -> Result<Self, FittingError> {
        if artifact.kind != LINEAR_KIND {
            return Err(FittingError::UnsupportedArtifact(artifact.kind.clone()));
        }
        serde_json::from_value(artifact.payload.clone())
            .map_err(|e| FittingError::UnsupportedArtifact(format!("{LINEAR_KIND} (bad payload: {e})")))
    }

    pub fn predict(&self, features: &[f64]) -> Option<Vec<f64>> {
        if features.len() != self.n_features || self.coefficients.len() != self.n_features + 1 {
            return None;
        }
        let mut out = self.coefficients[0].clone();
        for (row, &f) in self.coefficients[1..].iter().zip(features) {
            for (o, &b) in out.iter_mut().zip(row) {
                *o += f * b;
            }
        }
        Some(out)
    }
}
