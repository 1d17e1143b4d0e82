//! Single-body ablation model with erosion into grains.
//!
//! Main body state `[v, m, h, l, ablated, eroded]` is advanced with RK4.
//! With `K = Γ A ρ_m^(-2/3)` and air density `ρ_a(h)`:
//!
//! ```text
//! dv/dt        = -K ρ_a v² m^(-1/3)
//! d(ablated)/dt =  K σ ρ_a v³ m^(2/3)
//! d(eroded)/dt  =  K η ρ_a v³ m^(2/3)      (only below the erosion height)
//! dm/dt        = -(d(ablated)/dt + d(eroded)/dt)
//! dh/dt        = -v cos(z)
//! dl/dt        =  v
//! ```
//!
//! Mass eroded during a step is released as grain groups spread over
//! log-spaced mass bins (power-law mass index `s`). Grains ablate with the
//! same equations and contribute to the luminosity
//! `I = τ v²/2 · d(ablated)/dt`.

use tracing::trace;

use crate::domain::{
    CurveSample, ObservableCurve, ObservationConfig, ParamName, ParameterVector, PhysicsConfig,
    TerminationReason,
};
use crate::error::{ConfigError, SimulationError};
use crate::math::{log_space, rk4_step};
use crate::models::atmosphere::Atmosphere;
use crate::models::observe::observable_window;
use crate::models::TrajectoryModel;

const V: usize = 0;
const M: usize = 1;
const H: usize = 2;
const L: usize = 3;
const ABLATED: usize = 4;
const ERODED: usize = 5;

/// Luminosity floor (W) so magnitudes stay finite when nothing ablates.
const MIN_LUMINOSITY: f64 = 1e-30;

/// Erosion settings active during one step.
#[derive(Debug, Clone, Copy)]
struct ErosionState {
    coeff: f64,
    mass_index: f64,
}

/// A population of identical grains released during one step.
#[derive(Debug, Clone, Copy)]
struct GrainGroup {
    count: f64,
    mass: f64,
    v: f64,
    h: f64,
}

/// Constants of the main body for one trajectory.
#[derive(Debug, Clone, Copy)]
struct BodyConstants {
    /// `Γ A ρ_m^(-2/3)`
    k: f64,
    sigma: f64,
    cos_z: f64,
}

/// The reference physical model.
#[derive(Debug, Clone)]
pub struct AblationModel {
    physics: PhysicsConfig,
    observation: ObservationConfig,
    atmosphere: Atmosphere,
}

impl AblationModel {
    pub fn new(physics: PhysicsConfig, observation: ObservationConfig) -> Result<Self, ConfigError> {
        validate_physics(&physics)?;
        validate_observation(&observation)?;
        Ok(Self {
            physics,
            observation,
            atmosphere: Atmosphere::us_standard(),
        })
    }

    pub fn physics(&self) -> &PhysicsConfig {
        &self.physics
    }

    pub fn observation(&self) -> &ObservationConfig {
        &self.observation
    }

    /// Integrate the full trajectory, from `h_init` until termination.
    ///
    /// Unlike [`TrajectoryModel::simulate`], no visibility filtering is
    /// applied: every integration step is returned.
    pub fn integrate(
        &self,
        params: &ParameterVector,
        erosion_enabled: bool,
    ) -> Result<ObservableCurve, SimulationError> {
        let p = &self.physics;
        let rho = params.get(ParamName::Rho);
        let m_init = params.get(ParamName::MInit);
        let v_init = params.get(ParamName::VInit);
        if !(rho > 0.0 && m_init > 0.0 && v_init > 0.0) {
            return Err(SimulationError::Divergence {
                time: 0.0,
                detail: format!("non-physical initial state (rho={rho}, m={m_init}, v={v_init})"),
            });
        }

        let body = BodyConstants {
            k: p.drag_coeff * p.shape_factor * rho.powf(-2.0 / 3.0),
            sigma: params.get(ParamName::Sigma),
            cos_z: params.get(ParamName::ZenithAngle).cos(),
        };

        let mut y = [v_init, m_init, p.h_init, 0.0, 0.0, 0.0];
        let mut t = 0.0;
        let mut grains: Vec<GrainGroup> = Vec::new();
        let mut samples = Vec::new();

        let termination = loop {
            if y[M] < p.m_kill {
                break TerminationReason::MassDepleted;
            }
            if y[V] < p.v_kill {
                break TerminationReason::VelocityCutoff;
            }
            if y[H] < p.h_kill {
                break TerminationReason::HeightFloor;
            }
            if t >= p.t_max {
                break TerminationReason::TimeLimit;
            }

            let erosion = self.erosion_at(params, erosion_enabled, y[H]);
            let eta = erosion.map_or(0.0, |e| e.coeff);
            let (next, dt) = self.step_main(&y, t, body, eta)?;

            let v_mid = 0.5 * (y[V] + next[V]);
            let ablated = next[ABLATED] - y[ABLATED];
            let mut luminosity = p.lum_eff * 0.5 * v_mid * v_mid * ablated / dt;
            luminosity += self.step_grains(&mut grains, dt, body);

            let eroded = next[ERODED] - y[ERODED];
            if let Some(erosion) = erosion {
                if eroded > 0.0 {
                    self.release_grains(&mut grains, params, erosion, eroded, next[V], next[H]);
                }
            }

            t += dt;
            y = next;
            samples.push(CurveSample {
                time: t,
                height: y[H],
                length: y[L],
                velocity: y[V],
                magnitude: magnitude(luminosity, p.p_0m),
            });
        };

        trace!(
            steps = samples.len(),
            ?termination,
            grains = grains.len(),
            "trajectory integrated"
        );

        Ok(ObservableCurve {
            samples,
            termination,
        })
    }

    fn erosion_at(
        &self,
        params: &ParameterVector,
        erosion_enabled: bool,
        h: f64,
    ) -> Option<ErosionState> {
        if !erosion_enabled {
            return None;
        }
        if let Some(change) = self.physics.erosion_change {
            if h < change.height {
                return (change.coeff > 0.0).then_some(ErosionState {
                    coeff: change.coeff,
                    mass_index: change.mass_index,
                });
            }
        }
        let coeff = params.get(ParamName::ErosionCoeff);
        (coeff > 0.0 && h < params.get(ParamName::ErosionHeightStart)).then_some(ErosionState {
            coeff,
            mass_index: params.get(ParamName::ErosionMassIndex),
        })
    }

    /// One RK4 step of the main body, halving the step while the mass would
    /// go negative.
    fn step_main(
        &self,
        y: &[f64; 6],
        t: f64,
        body: BodyConstants,
        eta: f64,
    ) -> Result<([f64; 6], f64), SimulationError> {
        let mut dt = self.physics.dt;
        for _ in 0..=self.physics.max_refinements {
            let next = rk4_step(y, dt, |s| self.derivative(s, body, eta));
            if next.iter().any(|v| !v.is_finite()) {
                return Err(SimulationError::Divergence {
                    time: t,
                    detail: "non-finite state".to_string(),
                });
            }
            if next[M] >= 0.0 {
                return Ok((next, dt));
            }
            dt *= 0.5;
        }
        Err(SimulationError::Divergence {
            time: t,
            detail: format!(
                "mass went negative after {} step refinements",
                self.physics.max_refinements
            ),
        })
    }

    fn derivative(&self, s: &[f64; 6], body: BodyConstants, eta: f64) -> [f64; 6] {
        let v = s[V].max(0.0);
        let m = s[M].max(0.0);
        let dh = -v * body.cos_z;
        if m == 0.0 {
            return [0.0, 0.0, dh, v, 0.0, 0.0];
        }

        let rho_a = self.atmosphere.density(s[H]);
        let m13 = m.cbrt();
        let m23 = m13 * m13;
        let flux = body.k * rho_a * v * v * v * m23;

        let dv = -body.k * rho_a * v * v / m13;
        let ablation = body.sigma * flux;
        let erosion = eta * flux;
        [dv, -(ablation + erosion), dh, v, ablation, erosion]
    }

    /// Advance every grain group by one forward Euler step and return the
    /// luminosity they produced.
    fn step_grains(&self, grains: &mut Vec<GrainGroup>, dt: f64, body: BodyConstants) -> f64 {
        let p = &self.physics;
        let k = p.drag_coeff * p.shape_factor * p.rho_grain.powf(-2.0 / 3.0);

        let mut luminosity = 0.0;
        for g in grains.iter_mut() {
            let rho_a = self.atmosphere.density(g.h);
            let m13 = g.mass.cbrt();
            let dv = k * rho_a * g.v * g.v / m13 * dt;
            let dm = (body.sigma * k * rho_a * g.v.powi(3) * m13 * m13 * dt).min(g.mass);

            luminosity += g.count * p.lum_eff * 0.5 * g.v * g.v * dm / dt;
            g.mass -= dm;
            g.h -= g.v * body.cos_z * dt;
            g.v = (g.v - dv).max(0.0);
        }
        grains.retain(|g| g.mass >= p.m_kill && g.v >= p.v_kill && g.h.is_finite());
        luminosity
    }

    /// Split `eroded` kg into grain groups over the configured mass bins.
    fn release_grains(
        &self,
        grains: &mut Vec<GrainGroup>,
        params: &ParameterVector,
        erosion: ErosionState,
        eroded: f64,
        v: f64,
        h: f64,
    ) {
        let m_min = params.get(ParamName::ErosionMassMin);
        let m_max = params.get(ParamName::ErosionMassMax).max(m_min);
        let masses = log_space(m_min, m_max, self.physics.grain_bins.max(1))
            .unwrap_or_else(|| vec![m_min.max(self.physics.m_kill)]);

        // Mass per logarithmic bin of a power-law number distribution dN/dm ∝ m^-s.
        let weights: Vec<f64> = masses
            .iter()
            .map(|m| m.powf(2.0 - erosion.mass_index))
            .collect();
        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return;
        }

        for (&mass, &w) in masses.iter().zip(&weights) {
            let bin_mass = eroded * w / total;
            if mass > 0.0 && bin_mass > 0.0 {
                grains.push(GrainGroup {
                    count: bin_mass / mass,
                    mass,
                    v,
                    h,
                });
            }
        }
    }
}

impl TrajectoryModel for AblationModel {
    fn simulate(
        &self,
        params: &ParameterVector,
        erosion_enabled: bool,
    ) -> Result<ObservableCurve, SimulationError> {
        let full = self.integrate(params, erosion_enabled)?;
        observable_window(&full, &self.observation)
    }
}

fn magnitude(luminosity: f64, p_0m: f64) -> f64 {
    -2.5 * (luminosity.max(MIN_LUMINOSITY) / p_0m).log10()
}

fn validate_physics(p: &PhysicsConfig) -> Result<(), ConfigError> {
    let positive = [
        ("physics.dt", p.dt),
        ("physics.t_max", p.t_max),
        ("physics.m_kill", p.m_kill),
        ("physics.drag_coeff", p.drag_coeff),
        ("physics.shape_factor", p.shape_factor),
        ("physics.lum_eff", p.lum_eff),
        ("physics.p_0m", p.p_0m),
        ("physics.rho_grain", p.rho_grain),
    ];
    for (field, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::InvalidSetting {
                field,
                reason: format!("must be finite and > 0, got {value}"),
            });
        }
    }
    if !(p.h_init.is_finite() && p.h_kill.is_finite() && p.h_init > p.h_kill) {
        return Err(ConfigError::InvalidSetting {
            field: "physics.h_init",
            reason: format!("must be above h_kill ({} <= {})", p.h_init, p.h_kill),
        });
    }
    if !(p.v_kill.is_finite() && p.v_kill >= 0.0) {
        return Err(ConfigError::InvalidSetting {
            field: "physics.v_kill",
            reason: format!("must be finite and >= 0, got {}", p.v_kill),
        });
    }
    if p.grain_bins == 0 {
        return Err(ConfigError::InvalidSetting {
            field: "physics.grain_bins",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_observation(o: &ObservationConfig) -> Result<(), ConfigError> {
    if !(o.fps.is_finite() && o.fps > 0.0) {
        return Err(ConfigError::InvalidSetting {
            field: "observation.fps",
            reason: format!("must be finite and > 0, got {}", o.fps),
        });
    }
    if !(o.ht_max > o.ht_min) {
        return Err(ConfigError::InvalidSetting {
            field: "observation.ht_max",
            reason: "must be above ht_min".to_string(),
        });
    }
    if !(o.mag_faintest > o.mag_brightest) {
        return Err(ConfigError::InvalidSetting {
            field: "observation.mag_faintest",
            reason: "must be fainter (larger) than mag_brightest".to_string(),
        });
    }
    if o.data_length == 0 {
        return Err(ConfigError::InvalidSetting {
            field: "observation.data_length",
            reason: "must be at least 1".to_string(),
        });
    }
    if !(o.max_duration.is_finite() && o.max_duration > 0.0) {
        return Err(ConfigError::InvalidSetting {
            field: "observation.max_duration",
            reason: "must be finite and > 0".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SamplerConfig;

    fn model() -> AblationModel {
        AblationModel::new(PhysicsConfig::default(), ObservationConfig::default()).unwrap()
    }

    fn nominal() -> ParameterVector {
        ParameterVector::nominal(&SamplerConfig::default())
    }

    fn eroding() -> ParameterVector {
        let mut p = nominal();
        p.set(ParamName::ErosionHeightStart, 105_000.0);
        p.set(ParamName::ErosionCoeff, 0.3e-6);
        p
    }

    #[test]
    fn integration_is_deterministic() {
        let m = model();
        let a = m.integrate(&eroding(), true).unwrap();
        let b = m.integrate(&eroding(), true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn trajectory_is_finite_and_time_ordered() {
        let curve = model().integrate(&nominal(), false).unwrap();
        assert!(curve.len() > 100);
        for w in curve.samples.windows(2) {
            assert!(w[1].time > w[0].time);
            assert!(w[1].height < w[0].height);
            assert!(w[1].length > w[0].length);
        }
        for s in &curve.samples {
            assert!(s.time.is_finite() && s.height.is_finite() && s.magnitude.is_finite());
        }
        assert_eq!(curve.termination, TerminationReason::MassDepleted);
    }

    #[test]
    fn erosion_ends_the_meteor_higher() {
        let m = model();
        let plain = m.integrate(&eroding(), false).unwrap();
        let eroded = m.integrate(&eroding(), true).unwrap();
        let end_plain = plain.samples.last().unwrap().height;
        let end_eroded = eroded.samples.last().unwrap().height;
        assert!(
            end_eroded > end_plain + 1000.0,
            "eroded end {end_eroded} vs plain end {end_plain}"
        );
    }

    #[test]
    fn disabled_erosion_ignores_erosion_parameters() {
        let m = model();
        let a = m.integrate(&nominal(), false).unwrap();
        let b = m.integrate(&eroding(), false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_finite_parameters_diverge() {
        let mut p = nominal();
        p.set(ParamName::Sigma, f64::NAN);
        let err = model().integrate(&p, false).unwrap_err();
        assert!(matches!(err, SimulationError::Divergence { .. }));
    }

    #[test]
    fn invalid_physics_config_is_rejected() {
        let physics = PhysicsConfig {
            dt: 0.0,
            ..PhysicsConfig::default()
        };
        assert!(AblationModel::new(physics, ObservationConfig::default()).is_err());
    }
}
