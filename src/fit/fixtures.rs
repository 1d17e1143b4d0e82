//! Synthetic datasets for fitting tests, without running the physical model.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::data::Sampler;
use crate::domain::{
    CurveSample, Dataset, GenerationConfig, ObservableCurve, ParamName, ParameterVector,
    SamplerConfig, SimulationTrial, TerminationReason, TrialStatus,
};
use crate::error::SimulationError;

/// Erosion disabled: five free parameters.
pub fn synthetic_config() -> GenerationConfig {
    GenerationConfig {
        sampler: SamplerConfig {
            erosion_enabled: false,
            ..SamplerConfig::default()
        },
        ..GenerationConfig::default()
    }
}

/// A smooth light curve whose shape depends on `rho` (duration) and `sigma`
/// (peak brightness).
pub fn synthetic_curve(config: &SamplerConfig, params: &ParameterVector) -> ObservableCurve {
    let unit = |name: ParamName| config.spec(name).map_or(0.5, |s| s.normalize(params.get(name)));
    let duration = 0.5 + unit(ParamName::Rho);
    let peak = 1.0 + 3.0 * unit(ParamName::Sigma);
    let v = params.get(ParamName::VInit);
    let cos_z = params.get(ParamName::ZenithAngle).cos();

    let steps = (duration / 0.01).round() as usize;
    let samples = (0..=steps)
        .map(|i| {
            let t = i as f64 * 0.01;
            let u = (t - duration / 2.0) / (duration / 2.0);
            CurveSample {
                time: 0.1 + t,
                height: 110_000.0 - v * cos_z * t,
                length: v * t,
                velocity: v,
                magnitude: peak + 4.0 * u * u,
            }
        })
        .collect();
    ObservableCurve {
        samples,
        termination: TerminationReason::MassDepleted,
    }
}

/// `n` successful trials drawn from [`synthetic_config`].
pub fn synthetic_dataset(n: usize, seed: u64) -> Dataset {
    let config = synthetic_config();
    let sampler = Sampler::new(config.sampler.clone()).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dataset = Dataset::new(config);
    for id in 0..n as u64 {
        let params = sampler.draw(&mut rng);
        let curve = synthetic_curve(sampler.config(), &params);
        dataset.append(SimulationTrial {
            id,
            params,
            curve: Some(curve),
            status: TrialStatus::Success,
        });
    }
    dataset.meta.attempts = n;
    dataset
}

/// Like [`synthetic_dataset`], but every `every`-th trial failed.
pub fn dataset_with_failures(n: usize, every: usize, seed: u64) -> Dataset {
    let source = synthetic_dataset(n, seed);
    let mut dataset = Dataset::new(source.config().clone());
    for trial in source.trials() {
        if trial.id % every as u64 == 0 {
            dataset.append(SimulationTrial {
                curve: None,
                status: TrialStatus::Failed(SimulationError::NoSignal { visible: 0 }),
                ..trial.clone()
            });
        } else {
            dataset.append(trial.clone());
        }
    }
    dataset
}
