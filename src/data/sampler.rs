//! Parameter sampling from the configured priors.

use rand::Rng;
use rand::rngs::StdRng;

use crate::domain::{ParamLink, ParamName, ParamSpec, ParameterVector, SamplerConfig, Scale};
use crate::error::ConfigError;

/// Validated sampler. Construction checks the whole config once so `draw`
/// cannot fail.
#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Draw one parameter vector in canonical order.
    ///
    /// Erosion-only parameters are set to their inert value when erosion is
    /// disabled, regardless of their own spec.
    pub fn draw(&self, rng: &mut StdRng) -> ParameterVector {
        let mut out = ParameterVector::new([0.0; ParamName::COUNT]);
        for spec in &self.config.params {
            let value = match spec.name.inert_value() {
                Some(inert) if !self.config.erosion_enabled => inert,
                _ if spec.fixed => spec.value,
                _ => {
                    let (lo, hi) = linked_bounds(spec, &out);
                    draw_in(spec.scale, lo, hi, rng)
                }
            };
            out.set(spec.name, value);
        }
        out
    }
}

/// Range of a free parameter after applying its link constraint.
fn linked_bounds(spec: &ParamSpec, drawn: &ParameterVector) -> (f64, f64) {
    match spec.link {
        None => (spec.min, spec.max),
        Some(ParamLink::GreaterThan(target)) => {
            let lo = spec.min.max(drawn.get(target));
            (lo, spec.max.max(lo))
        }
        Some(ParamLink::LessThan(target)) => {
            let hi = spec.max.min(drawn.get(target));
            (spec.min.min(hi), hi)
        }
    }
}

fn draw_in(scale: Scale, lo: f64, hi: f64, rng: &mut StdRng) -> f64 {
    if !(hi > lo) {
        return lo;
    }
    match scale {
        Scale::Linear => rng.gen_range(lo..=hi),
        Scale::Log10 => 10f64
            .powf(rng.gen_range(lo.log10()..=hi.log10()))
            .clamp(lo, hi),
    }
}

fn validate(config: &SamplerConfig) -> Result<(), ConfigError> {
    if config.params.len() != ParamName::COUNT {
        return Err(ConfigError::ParamCount {
            expected: ParamName::COUNT,
            actual: config.params.len(),
        });
    }
    for (index, (spec, expected)) in config.params.iter().zip(ParamName::ALL).enumerate() {
        if spec.name != expected {
            return Err(ConfigError::ParamOrder {
                index,
                expected: expected.key(),
                found: spec.name.key(),
            });
        }
    }

    for spec in &config.params {
        if let Some(link) = spec.link {
            if link.target().index() >= spec.name.index() {
                return Err(ConfigError::InvalidLink {
                    name: spec.name.key(),
                    target: link.target().key(),
                });
            }
        }
        if spec.name.is_erosion() && !config.erosion_enabled {
            continue;
        }
        validate_spec(spec)?;
    }
    Ok(())
}

fn validate_spec(spec: &ParamSpec) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidRange {
        name: spec.name.key(),
        reason,
    };

    if spec.fixed {
        return if spec.value.is_finite() {
            Ok(())
        } else {
            Err(invalid(format!("fixed value {} is not finite", spec.value)))
        };
    }

    if !(spec.min.is_finite() && spec.max.is_finite()) {
        return Err(invalid(format!("bounds [{}, {}] are not finite", spec.min, spec.max)));
    }
    if spec.min >= spec.max {
        return Err(invalid(format!(
            "free parameter needs min < max, got [{}, {}]",
            spec.min, spec.max
        )));
    }
    if spec.scale == Scale::Log10 && spec.min <= 0.0 {
        return Err(invalid(format!("log10 scale needs min > 0, got {}", spec.min)));
    }
    Ok(())
}

/// Derive an independent seed for sub-stream `index` of `master` (SplitMix64).
///
/// Used for per-attempt RNGs so results do not depend on scheduling.
pub fn split_seed(master: u64, index: u64) -> u64 {
    let mut z = master.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn fixed_parameters_never_move() {
        let mut config = SamplerConfig::default();
        for name in [ParamName::VInit, ParamName::Rho, ParamName::ErosionCoeff] {
            let spec = config.spec_mut(name).unwrap();
            spec.fixed = true;
        }
        let sampler = Sampler::new(config.clone()).unwrap();
        let mut rng = rng(7);
        for _ in 0..500 {
            let p = sampler.draw(&mut rng);
            assert_eq!(p.get(ParamName::VInit), 30_520.0);
            assert_eq!(p.get(ParamName::Rho), 2000.0);
            assert_eq!(p.get(ParamName::ErosionCoeff), 0.3e-6);
        }
    }

    #[test]
    fn log_scaled_draws_are_uniform_in_log_space() {
        let config = SamplerConfig::default();
        let spec = config.spec(ParamName::Rho).unwrap().clone();
        assert_eq!(spec.scale, Scale::Log10);
        let geometric_mean = (spec.min * spec.max).sqrt();

        let sampler = Sampler::new(config).unwrap();
        let mut rng = rng(5);
        let n = 4000;
        let below = (0..n)
            .filter(|_| sampler.draw(&mut rng).get(ParamName::Rho) < geometric_mean)
            .count();
        // A linear prior would put only ~15% of draws below the geometric mean.
        let fraction = below as f64 / n as f64;
        assert!((0.45..0.55).contains(&fraction), "fraction below = {fraction}");
    }

    #[test]
    fn free_draws_stay_in_range() {
        let config = SamplerConfig::default();
        let sampler = Sampler::new(config.clone()).unwrap();
        let mut rng = rng(1);
        for _ in 0..500 {
            let p = sampler.draw(&mut rng);
            for spec in &config.params {
                let v = p.get(spec.name);
                assert!(v >= spec.min && v <= spec.max, "{} = {v}", spec.name);
            }
            assert!(p.get(ParamName::ErosionMassMax) >= p.get(ParamName::ErosionMassMin));
        }
    }

    #[test]
    fn disabled_erosion_emits_inert_values() {
        let config = SamplerConfig {
            erosion_enabled: false,
            ..SamplerConfig::default()
        };
        let sampler = Sampler::new(config).unwrap();
        let mut rng = rng(3);
        for _ in 0..200 {
            let p = sampler.draw(&mut rng);
            for name in ParamName::ALL.into_iter().filter(|n| n.is_erosion()) {
                assert_eq!(Some(p.get(name)), name.inert_value());
            }
        }
    }

    #[test]
    fn disabled_erosion_skips_validation_of_erosion_specs() {
        let mut config = SamplerConfig {
            erosion_enabled: false,
            ..SamplerConfig::default()
        };
        config.spec_mut(ParamName::ErosionMassMin).unwrap().min = -1.0;
        assert!(Sampler::new(config.clone()).is_ok());

        config.erosion_enabled = true;
        assert!(matches!(
            Sampler::new(config),
            Err(ConfigError::InvalidRange { name: "erosion_mass_min", .. })
        ));
    }

    #[test]
    fn same_seed_same_draws() {
        let sampler = Sampler::new(SamplerConfig::default()).unwrap();
        let draws = |seed| {
            let mut r = rng(seed);
            (0..20).map(|_| sampler.draw(&mut r)).collect::<Vec<_>>()
        };
        assert_eq!(draws(99), draws(99));
        assert_ne!(draws(99), draws(100));
    }

    #[test]
    fn misordered_or_forward_linked_specs_are_rejected() {
        let mut config = SamplerConfig::default();
        config.params.swap(0, 1);
        assert!(matches!(
            Sampler::new(config),
            Err(ConfigError::ParamOrder { index: 0, .. })
        ));

        let mut config = SamplerConfig::default();
        config.spec_mut(ParamName::ErosionMassMin).unwrap().link =
            Some(ParamLink::LessThan(ParamName::ErosionMassMax));
        assert!(matches!(
            Sampler::new(config),
            Err(ConfigError::InvalidLink { .. })
        ));

        let mut config = SamplerConfig::default();
        config.params.pop();
        assert!(matches!(
            Sampler::new(config),
            Err(ConfigError::ParamCount { expected: 10, actual: 9 })
        ));
    }

    #[test]
    fn free_parameter_with_empty_range_is_rejected() {
        let mut config = SamplerConfig::default();
        let spec = config.spec_mut(ParamName::Sigma).unwrap();
        spec.max = spec.min;
        assert!(Sampler::new(config.clone()).is_err());

        config.spec_mut(ParamName::Sigma).unwrap().fixed = true;
        assert!(Sampler::new(config).is_ok());
    }

    #[test]
    fn split_seeds_differ_per_index() {
        let seeds: std::collections::BTreeSet<u64> = (0..1000).map(|k| split_seed(42, k)).collect();
        assert_eq!(seeds.len(), 1000);
        assert_eq!(split_seed(42, 5), split_seed(42, 5));
        assert_ne!(split_seed(42, 5), split_seed(43, 5));
    }
}
