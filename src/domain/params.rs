//! Physical parameters of the meteoroid model and their sampling priors.
//!
//! Parameters are addressed by [`ParamName`], never by position. The only
//! place where a positional layout survives is the CLI `--fixed` vector, which
//! is mapped onto [`ParamName::ALL`] order.

use std::collections::{BTreeMap, BTreeSet};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One of the physical quantities that define a simulated meteoroid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ParamName {
    /// Initial mass (kg).
    MInit,
    /// Initial velocity (m/s).
    VInit,
    /// Zenith angle of the radiant (rad).
    ZenithAngle,
    /// Bulk density (kg/m³).
    Rho,
    /// Intrinsic ablation coefficient (s²/m²).
    Sigma,
    /// Height below which erosion starts (m).
    ErosionHeightStart,
    /// Erosion coefficient (s²/m²).
    ErosionCoeff,
    /// Mass index of the eroded grain distribution.
    ErosionMassIndex,
    /// Smallest eroded grain mass (kg).
    ErosionMassMin,
    /// Largest eroded grain mass (kg).
    ErosionMassMax,
}

impl ParamName {
    pub const COUNT: usize = 10;

    /// Canonical order (draw order, label order, CLI flag order).
    pub const ALL: [ParamName; ParamName::COUNT] = [
        ParamName::MInit,
        ParamName::VInit,
        ParamName::ZenithAngle,
        ParamName::Rho,
        ParamName::Sigma,
        ParamName::ErosionHeightStart,
        ParamName::ErosionCoeff,
        ParamName::ErosionMassIndex,
        ParamName::ErosionMassMin,
        ParamName::ErosionMassMax,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn key(self) -> &'static str {
        match self {
            ParamName::MInit => "m_init",
            ParamName::VInit => "v_init",
            ParamName::ZenithAngle => "zenith_angle",
            ParamName::Rho => "rho",
            ParamName::Sigma => "sigma",
            ParamName::ErosionHeightStart => "erosion_height_start",
            ParamName::ErosionCoeff => "erosion_coeff",
            ParamName::ErosionMassIndex => "erosion_mass_index",
            ParamName::ErosionMassMin => "erosion_mass_min",
            ParamName::ErosionMassMax => "erosion_mass_max",
        }
    }

    /// True for parameters that only matter when erosion is simulated.
    pub fn is_erosion(self) -> bool {
        self.inert_value().is_some()
    }

    /// Value forced onto erosion-only parameters when erosion is disabled.
    pub fn inert_value(self) -> Option<f64> {
        match self {
            ParamName::ErosionHeightStart => Some(0.0),
            ParamName::ErosionCoeff => Some(0.0),
            ParamName::ErosionMassIndex => Some(2.0),
            ParamName::ErosionMassMin => Some(1e-12),
            ParamName::ErosionMassMax => Some(1e-10),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Sampling space of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Uniform in `[min, max]`.
    Linear,
    /// Uniform in `[log10(min), log10(max)]`.
    Log10,
}

/// Bound a parameter's draw by the value of an earlier parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLink {
    GreaterThan(ParamName),
    LessThan(ParamName),
}

impl ParamLink {
    pub fn target(self) -> ParamName {
        match self {
            ParamLink::GreaterThan(p) | ParamLink::LessThan(p) => p,
        }
    }
}

/// Prior of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: ParamName,
    pub min: f64,
    pub max: f64,
    pub scale: Scale,
    /// Emit `value` instead of drawing.
    pub fixed: bool,
    /// Fixed value (also the nominal value when the parameter is free).
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<ParamLink>,
}

impl ParamSpec {
    pub fn linear(name: ParamName, min: f64, max: f64, value: f64) -> Self {
        Self {
            name,
            min,
            max,
            scale: Scale::Linear,
            fixed: false,
            value,
            link: None,
        }
    }

    pub fn log10(name: ParamName, min: f64, max: f64, value: f64) -> Self {
        Self {
            scale: Scale::Log10,
            ..Self::linear(name, min, max, value)
        }
    }

    pub fn with_link(mut self, link: ParamLink) -> Self {
        self.link = Some(link);
        self
    }

    /// Map a physical value into `[0, 1]` over this parameter's range.
    pub fn normalize(&self, value: f64) -> f64 {
        match self.scale {
            Scale::Linear => {
                let span = self.max - self.min;
                if span == 0.0 { 0.0 } else { (value - self.min) / span }
            }
            Scale::Log10 => {
                let lo = self.min.log10();
                let span = self.max.log10() - lo;
                if span == 0.0 { 0.0 } else { (value.log10() - lo) / span }
            }
        }
    }

    /// Inverse of [`ParamSpec::normalize`].
    pub fn denormalize(&self, unit: f64) -> f64 {
        match self.scale {
            Scale::Linear => self.min + unit * (self.max - self.min),
            Scale::Log10 => {
                let lo = self.min.log10();
                10f64.powf(lo + unit * (self.max.log10() - lo))
            }
        }
    }

    /// Centre of the range in sampling space.
    pub fn midpoint(&self) -> f64 {
        self.denormalize(0.5)
    }
}

/// Priors for every parameter plus the erosion toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// One spec per [`ParamName`], in canonical order.
    pub params: Vec<ParamSpec>,
    pub erosion_enabled: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        use ParamName::*;
        Self {
            params: vec![
                ParamSpec::log10(MInit, 5e-7, 1e-3, 2.4671e-6),
                ParamSpec::linear(VInit, 11_000.0, 72_000.0, 30_520.0),
                ParamSpec::linear(
                    ZenithAngle,
                    20f64.to_radians(),
                    80f64.to_radians(),
                    39.2f64.to_radians(),
                ),
                ParamSpec::log10(Rho, 100.0, 3500.0, 2000.0),
                ParamSpec::linear(Sigma, 0.005e-6, 0.3e-6, 0.05e-6),
                ParamSpec::linear(ErosionHeightStart, 70_000.0, 130_000.0, 100_000.0),
                ParamSpec::log10(ErosionCoeff, 1.0e-9, 1.0e-6, 0.3e-6),
                ParamSpec::linear(ErosionMassIndex, 1.5, 3.0, 2.0),
                ParamSpec::log10(ErosionMassMin, 1e-12, 1e-9, 1e-12),
                ParamSpec::log10(ErosionMassMax, 1e-11, 1e-7, 1e-10)
                    .with_link(ParamLink::GreaterThan(ErosionMassMin)),
            ],
            erosion_enabled: true,
        }
    }
}

impl SamplerConfig {
    pub fn spec(&self, name: ParamName) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn spec_mut(&mut self, name: ParamName) -> Option<&mut ParamSpec> {
        self.params.iter_mut().find(|p| p.name == name)
    }

    /// True when the parameter is actually drawn (not fixed, not disabled).
    pub fn is_free(&self, name: ParamName) -> bool {
        if name.is_erosion() && !self.erosion_enabled {
            return false;
        }
        self.spec(name).is_some_and(|s| !s.fixed)
    }

    /// Free parameters in canonical order; these are the learnable labels.
    pub fn free_params(&self) -> Vec<ParamName> {
        ParamName::ALL
            .into_iter()
            .filter(|&name| self.is_free(name))
            .collect()
    }

    /// Parameters flagged `fixed` (irrespective of the erosion toggle).
    pub fn fixed_set(&self) -> BTreeSet<ParamName> {
        self.params
            .iter()
            .filter(|s| s.fixed)
            .map(|s| s.name)
            .collect()
    }

    /// Apply a positional fixed/free vector (one flag per [`ParamName::ALL`] entry).
    pub fn with_fixed_flags(mut self, flags: &[bool]) -> Result<Self, ConfigError> {
        if flags.len() != ParamName::COUNT {
            return Err(ConfigError::FlagCount {
                expected: ParamName::COUNT,
                actual: flags.len(),
            });
        }
        for (name, &fixed) in ParamName::ALL.into_iter().zip(flags) {
            if let Some(spec) = self.spec_mut(name) {
                spec.fixed = fixed;
            }
        }
        Ok(self)
    }
}

/// One value per [`ParamName`].
///
/// Serialized as a JSON object keyed by parameter name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<ParamName, f64>",
    try_from = "BTreeMap<ParamName, f64>"
)]
pub struct ParameterVector {
    values: [f64; ParamName::COUNT],
}

impl ParameterVector {
    pub fn new(values: [f64; ParamName::COUNT]) -> Self {
        Self { values }
    }

    /// Every parameter at its nominal (`value`) setting.
    pub fn nominal(config: &SamplerConfig) -> Self {
        let mut out = Self::new([0.0; ParamName::COUNT]);
        for spec in &config.params {
            out.set(spec.name, spec.value);
        }
        out
    }

    pub fn get(&self, name: ParamName) -> f64 {
        self.values[name.index()]
    }

    pub fn set(&mut self, name: ParamName, value: f64) {
        self.values[name.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamName, f64)> + '_ {
        ParamName::ALL.into_iter().map(|name| (name, self.get(name)))
    }

    pub fn values(&self) -> &[f64; ParamName::COUNT] {
        &self.values
    }
}

impl From<ParameterVector> for BTreeMap<ParamName, f64> {
    fn from(value: ParameterVector) -> Self {
        value.iter().collect()
    }
}

impl TryFrom<BTreeMap<ParamName, f64>> for ParameterVector {
    type Error = String;

    fn try_from(map: BTreeMap<ParamName, f64>) -> Result<Self, Self::Error> {
        let mut values = [0.0; ParamName::COUNT];
        for name in ParamName::ALL {
            values[name.index()] = *map
                .get(&name)
                .ok_or_else(|| format!("missing parameter '{name}'"))?;
        }
        Ok(Self { values })
    }
}
