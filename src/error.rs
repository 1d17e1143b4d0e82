//! Error types.
//!
//! Library code returns one typed enum per stage (simulation, generation,
//! partitioning, fitting, persistence). The binary collapses all of them into
//! [`AppError`], which carries the process exit code.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ParamName;
use crate::fit::region::Region;

/// Exit code for configuration, usage and I/O problems.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when there is not enough usable data.
pub const EXIT_DATA: u8 = 3;
/// Exit code for internal/numerical failures.
pub const EXIT_INTERNAL: u8 = 4;
/// Exit code for a cooperative cancellation.
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a single trajectory could not be turned into an observable curve.
///
/// Stored inside failed trials, hence serializable.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationError {
    #[error("integration diverged at t={time:.4}s: {detail}")]
    Divergence { time: f64, detail: String },

    #[error("meteor never became observable ({visible} visible samples)")]
    NoSignal { visible: usize },

    #[error("time bound reached at t={time:.4}s while the meteor was still visible")]
    Timeout { time: f64 },
}

/// Invalid sampler / physics / observation configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("expected {expected} parameter specs, got {actual}")]
    ParamCount { expected: usize, actual: usize },

    #[error("parameter spec #{index} is '{found}', expected '{expected}'")]
    ParamOrder {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid range for '{name}': {reason}")]
    InvalidRange { name: &'static str, reason: String },

    #[error("'{name}' is linked to '{target}', which is not drawn before it")]
    InvalidLink {
        name: &'static str,
        target: &'static str,
    },

    #[error("fixed flags must have {expected} entries, got {actual}")]
    FlagCount { expected: usize, actual: usize },

    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("invalid generation config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error(
        "insufficient yield: {produced} of {requested} requested trials succeeded after {attempts} attempts"
    )]
    InsufficientYield {
        requested: usize,
        produced: usize,
        attempts: usize,
    },

    #[error("generation cancelled after {attempts} attempts")]
    Cancelled { attempts: usize },

    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("partition axis '{axis}' is not a sampled dimension of this dataset: {reason}")]
    IncompatibleScheme { axis: ParamName, reason: String },

    #[error("unknown region code {0}")]
    UnknownRegion(i32),

    #[error("region {region:?} is not part of the {layout} layout")]
    LayoutMismatch { region: Region, layout: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("trainer failed: {0}")]
pub struct TrainerError(pub String);

#[derive(Error, Debug)]
pub enum FittingError {
    #[error("dataset config does not match the expected config: {0}")]
    ConfigMismatch(String),

    #[error("no usable trials for region {region:?}")]
    EmptySubset { region: Region },

    #[error("every parameter is fixed; there is nothing to learn")]
    NoFreeParameters,

    #[error("invalid grouping: {0}")]
    InvalidGrouping(String),

    #[error(
        "grouping needs {needed} trials but only {available} are available and repetition is disabled"
    )]
    InsufficientTrials { needed: usize, available: usize },

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Trainer(#[from] TrainerError),

    #[error("feature extraction failed for trial {trial}: {reason}")]
    Features { trial: u64, reason: String },

    #[error("model artifact kind '{0}' cannot be evaluated here")]
    UnsupportedArtifact(String),

    #[error("fitting cancelled after {batches} batches")]
    Cancelled { batches: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(EXIT_CONFIG, err.to_string())
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        let code = match &err {
            GenerationError::InvalidConfig(_) => EXIT_CONFIG,
            GenerationError::InsufficientYield { .. } => EXIT_DATA,
            GenerationError::Cancelled { .. } => EXIT_CANCELLED,
            GenerationError::Pool(_) => EXIT_INTERNAL,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<PartitionError> for AppError {
    fn from(err: PartitionError) -> Self {
        AppError::new(EXIT_CONFIG, err.to_string())
    }
}

impl From<FittingError> for AppError {
    fn from(err: FittingError) -> Self {
        let code = match &err {
            FittingError::ConfigMismatch(_)
            | FittingError::InvalidGrouping(_)
            | FittingError::Partition(_)
            | FittingError::UnsupportedArtifact(_) => EXIT_CONFIG,
            FittingError::EmptySubset { .. }
            | FittingError::NoFreeParameters
            | FittingError::InsufficientTrials { .. } => EXIT_DATA,
            FittingError::Trainer(_) | FittingError::Features { .. } => EXIT_INTERNAL,
            FittingError::Cancelled { .. } => EXIT_CANCELLED,
            FittingError::Store(_) => EXIT_CONFIG,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::new(EXIT_CONFIG, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let yield_err = GenerationError::InsufficientYield {
            requested: 10,
            produced: 0,
            attempts: 100,
        };
        assert_eq!(AppError::from(yield_err).exit_code(), EXIT_DATA);

        let mismatch = FittingError::ConfigMismatch("erosion".into());
        assert_eq!(AppError::from(mismatch).exit_code(), EXIT_CONFIG);

        let cancelled = FittingError::Cancelled { batches: 3 };
        assert_eq!(AppError::from(cancelled).exit_code(), EXIT_CANCELLED);
    }

    #[test]
    fn simulation_error_serializes_with_kind_tag() {
        let err = SimulationError::NoSignal { visible: 3 };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"no_signal\""));
        let back: SimulationError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
