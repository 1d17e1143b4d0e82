//! Shared domain types.
//!
//! These types are kept plain and serializable so they can be:
//!
//! - produced by the simulator and generator
//! - persisted as part of a dataset
//! - reloaded by the fitting driver without re-simulating

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::params::{ParameterVector, SamplerConfig};
use crate::error::SimulationError;

/// One point of a simulated observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSample {
    /// Seconds since the start of the integration.
    pub time: f64,
    /// Height of the leading fragment (m).
    pub height: f64,
    /// Distance travelled along the trajectory (m).
    pub length: f64,
    /// Velocity of the leading fragment (m/s).
    pub velocity: f64,
    /// Absolute magnitude of the total luminosity.
    pub magnitude: f64,
}

/// Why the integration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    MassDepleted,
    VelocityCutoff,
    HeightFloor,
    TimeLimit,
}

/// The observable part of a simulated trajectory: light curve + deceleration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableCurve {
    /// Strictly increasing in time.
    pub samples: Vec<CurveSample>,
    pub termination: TerminationReason,
}

impl ObservableCurve {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(a), Some(b)) => b.time - a.time,
            _ => 0.0,
        }
    }

    pub fn peak_magnitude(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.magnitude).reduce(f64::min)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Success,
    Failed(SimulationError),
}

/// One (parameters, observation) pair. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrial {
    /// Attempt index within the generation run.
    pub id: u64,
    pub params: ParameterVector,
    /// Empty for failed trials.
    pub curve: Option<ObservableCurve>,
    pub status: TrialStatus,
}

impl SimulationTrial {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TrialStatus::Success)
    }
}

/// Erosion parameters that take over below a second height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErosionChange {
    /// Height below which the change applies (m).
    pub height: f64,
    /// Erosion coefficient after the change (s²/m²).
    pub coeff: f64,
    /// Grain mass index after the change.
    pub mass_index: f64,
}

/// Integration settings of the ablation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Integration step (s).
    pub dt: f64,
    /// Height at which the integration starts (m).
    pub h_init: f64,
    /// Maximum integrated time (s).
    pub t_max: f64,
    /// Main body mass below which it is considered consumed (kg).
    pub m_kill: f64,
    /// Velocity below which ablation stops (m/s).
    pub v_kill: f64,
    /// Height floor (m).
    pub h_kill: f64,
    /// Drag coefficient Γ.
    pub drag_coeff: f64,
    /// Shape factor A.
    pub shape_factor: f64,
    /// Luminous efficiency τ.
    pub lum_eff: f64,
    /// Power of a zero-magnitude meteor (W).
    pub p_0m: f64,
    /// Density of eroded grains (kg/m³).
    pub rho_grain: f64,
    /// Number of mass bins eroded mass is split into.
    pub grain_bins: usize,
    pub erosion_change: Option<ErosionChange>,
    /// Maximum number of step halvings before declaring divergence.
    pub max_refinements: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dt: 0.005,
            h_init: 180_000.0,
            t_max: 15.0,
            m_kill: 1e-14,
            v_kill: 3_000.0,
            h_kill: 60_000.0,
            drag_coeff: 1.0,
            shape_factor: 1.21,
            lum_eff: 0.007,
            p_0m: 840.0,
            rho_grain: 3_000.0,
            grain_bins: 10,
            erosion_change: None,
            max_refinements: 20,
        }
    }
}

/// Camera model: what counts as observed and how curves are normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Frames per second of the observing system.
    pub fps: f64,
    /// Limiting magnitude when the meteor first appears.
    pub lim_mag_start: f64,
    /// Limiting magnitude when the meteor disappears.
    pub lim_mag_end: f64,
    /// Peak magnitude must be brighter (smaller) than this.
    pub peak_mag_faintest: f64,
    pub ht_min: f64,
    pub ht_max: f64,
    /// Minimum visible duration (s).
    pub visibility_time_min: f64,
    pub min_visible_samples: usize,
    /// Length of each resampled feature channel.
    pub data_length: usize,
    /// Time normalization (s).
    pub max_duration: f64,
    pub mag_faintest: f64,
    pub mag_brightest: f64,
    /// Delay before length measurements start (s).
    pub len_delay: f64,
    /// Std dev of magnitude noise.
    pub mag_noise: f64,
    /// Std dev of length noise (m).
    pub len_noise: f64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            fps: 80.0,
            lim_mag_start: 8.0,
            lim_mag_end: 8.0,
            peak_mag_faintest: 6.0,
            ht_min: 70_000.0,
            ht_max: 130_000.0,
            visibility_time_min: 0.2,
            min_visible_samples: 10,
            data_length: 256,
            max_duration: 10.0,
            mag_faintest: 10.0,
            mag_brightest: -2.0,
            len_delay: 0.0,
            mag_noise: 0.1,
            len_noise: 20.0,
        }
    }
}

/// Everything needed to regenerate a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub sampler: SamplerConfig,
    pub physics: PhysicsConfig,
    pub observation: ObservationConfig,
    pub sample_count: usize,
    pub master_seed: u64,
    /// Attempts allowed per requested trial.
    pub retry_factor: usize,
    /// Also store failed attempts.
    pub keep_failed: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            physics: PhysicsConfig::default(),
            observation: ObservationConfig::default(),
            sample_count: 1000,
            master_seed: 42,
            retry_factor: 10,
            keep_failed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub tool: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub config: GenerationConfig,
    /// Attempts made to reach the requested number of trials.
    pub attempts: usize,
}

/// Append-only collection of trials generated under one config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub meta: DatasetMeta,
    trials: Vec<SimulationTrial>,
}

impl Dataset {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            meta: DatasetMeta {
                tool: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: Utc::now(),
                config,
                attempts: 0,
            },
            trials: Vec::new(),
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.meta.config
    }

    pub fn append(&mut self, trial: SimulationTrial) {
        self.trials.push(trial);
    }

    pub fn trials(&self) -> &[SimulationTrial] {
        &self.trials
    }

    pub fn successes(&self) -> impl Iterator<Item = &SimulationTrial> {
        self.trials.iter().filter(|t| t.is_success())
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Drop failed trials.
    pub fn compact(mut self) -> Self {
        self.trials.retain(SimulationTrial::is_success);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(id: u64, status: TrialStatus) -> SimulationTrial {
        SimulationTrial {
            id,
            params: ParameterVector::nominal(&SamplerConfig::default()),
            curve: None,
            status,
        }
    }

    #[test]
    fn compact_drops_only_failed_trials() {
        let mut ds = Dataset::new(GenerationConfig::default());
        ds.append(trial(0, TrialStatus::Success));
        ds.append(trial(1, TrialStatus::Failed(SimulationError::NoSignal { visible: 0 })));
        ds.append(trial(2, TrialStatus::Success));

        let ds = ds.compact();
        let ids: Vec<u64> = ds.trials().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn partial_config_json_uses_defaults() {
        let cfg: GenerationConfig = serde_json::from_str("{\"sample_count\": 7}").unwrap();
        assert_eq!(cfg.sample_count, 7);
        assert_eq!(cfg.physics, PhysicsConfig::default());
        assert_eq!(cfg.retry_factor, 10);
    }
}
