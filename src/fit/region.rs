//! Region-of-interest partitioning over two parameter axes.
//!
//! A [`PartitionScheme`] splits each axis at the midpoint of its configured
//! range, measured in the axis' sampling space (geometric midpoint for log10
//! parameters). A value below the midpoint is "lower"/"left", anything else is
//! "upper"/"right". Values outside the configured range still land in the
//! nearest side, so every layout covers every trial exactly once.
//!
//! `x` carries left/right, `y` carries lower/upper and bottom/top.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{Dataset, ParamName, ParameterVector, SamplerConfig, SimulationTrial};
use crate::error::PartitionError;

/// Named subset of the parameter space. The integer code only exists for the
/// CLI and file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Full,
    LowerLeft,
    LowerRight,
    BottomHalf,
    UpperLeft,
    UpperRight,
    TopHalf,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::Full,
        Region::LowerLeft,
        Region::LowerRight,
        Region::BottomHalf,
        Region::UpperLeft,
        Region::UpperRight,
        Region::TopHalf,
    ];

    pub fn code(self) -> i32 {
        match self {
            Region::Full => -1,
            Region::LowerLeft => 0,
            Region::LowerRight => 1,
            Region::BottomHalf => 2,
            Region::UpperLeft => 3,
            Region::UpperRight => 4,
            Region::TopHalf => 5,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, PartitionError> {
        Region::ALL
            .into_iter()
            .find(|r| r.code() == code)
            .ok_or(PartitionError::UnknownRegion(code))
    }

    /// The layout this region belongs to.
    pub fn layout(self) -> Layout {
        match self {
            Region::Full => Layout::Whole,
            Region::LowerLeft | Region::LowerRight | Region::UpperLeft | Region::UpperRight => {
                Layout::Quadrants
            }
            Region::BottomHalf | Region::TopHalf => Layout::Halves,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Region::Full => "full",
            Region::LowerLeft => "lower-left",
            Region::LowerRight => "lower-right",
            Region::BottomHalf => "bottom-half",
            Region::UpperLeft => "upper-left",
            Region::UpperRight => "upper-right",
            Region::TopHalf => "top-half",
        };
        write!(f, "{name} (roi {})", self.code())
    }
}

/// How the parameter plane is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// No partition.
    Whole,
    /// Both axes split.
    Quadrants,
    /// Only `y` split.
    Halves,
}

impl Layout {
    pub fn regions(self) -> &'static [Region] {
        match self {
            Layout::Whole => &[Region::Full],
            Layout::Quadrants => &[
                Region::LowerLeft,
                Region::LowerRight,
                Region::UpperLeft,
                Region::UpperRight,
            ],
            Layout::Halves => &[Region::BottomHalf, Region::TopHalf],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Layout::Whole => "whole",
            Layout::Quadrants => "quadrants",
            Layout::Halves => "halves",
        }
    }

    fn axes(self, scheme: &PartitionScheme) -> Vec<ParamName> {
        match self {
            Layout::Whole => Vec::new(),
            Layout::Quadrants => vec![scheme.x, scheme.y],
            Layout::Halves => vec![scheme.y],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionScheme {
    pub x: ParamName,
    pub y: ParamName,
    pub layout: Layout,
}

impl Default for PartitionScheme {
    fn default() -> Self {
        Self {
            x: ParamName::Rho,
            y: ParamName::Sigma,
            layout: Layout::Whole,
        }
    }
}

impl PartitionScheme {
    /// Scheme whose layout is the one `region` belongs to.
    pub fn for_region(x: ParamName, y: ParamName, region: Region) -> Self {
        Self {
            x,
            y,
            layout: region.layout(),
        }
    }

    /// Check the scheme against the config a dataset was generated with.
    pub fn validate(&self, config: &SamplerConfig) -> Result<(), PartitionError> {
        if self.layout == Layout::Quadrants && self.x == self.y {
            return Err(PartitionError::IncompatibleScheme {
                axis: self.x,
                reason: "both axes are the same parameter".to_string(),
            });
        }
        for axis in self.layout.axes(self) {
            if axis.is_erosion() && !config.erosion_enabled {
                return Err(PartitionError::IncompatibleScheme {
                    axis,
                    reason: "erosion is disabled in this dataset".to_string(),
                });
            }
            if !config.is_free(axis) {
                return Err(PartitionError::IncompatibleScheme {
                    axis,
                    reason: "parameter is fixed in this dataset".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Region of the current layout that `params` falls into.
    ///
    /// Assumes [`PartitionScheme::validate`] passed for `config`.
    pub fn classify(&self, config: &SamplerConfig, params: &ParameterVector) -> Region {
        let upper = |axis: ParamName| {
            config
                .spec(axis)
                .is_some_and(|spec| params.get(axis) >= spec.midpoint())
        };
        match self.layout {
            Layout::Whole => Region::Full,
            Layout::Halves => {
                if upper(self.y) {
                    Region::TopHalf
                } else {
                    Region::BottomHalf
                }
            }
            Layout::Quadrants => match (upper(self.x), upper(self.y)) {
                (false, false) => Region::LowerLeft,
                (true, false) => Region::LowerRight,
                (false, true) => Region::UpperLeft,
                (true, true) => Region::UpperRight,
            },
        }
    }
}

/// Split every trial of `dataset` into the regions of `scheme.layout`.
///
/// Every region of the layout is present in the result, possibly empty.
/// Trials keep their dataset order within a region.
pub fn partition<'a>(
    dataset: &'a Dataset,
    scheme: &PartitionScheme,
) -> Result<BTreeMap<Region, Vec<&'a SimulationTrial>>, PartitionError> {
    let config = &dataset.config().sampler;
    scheme.validate(config)?;

    let mut out: BTreeMap<Region, Vec<&SimulationTrial>> = scheme
        .layout
        .regions()
        .iter()
        .map(|&r| (r, Vec::new()))
        .collect();
    for trial in dataset.trials() {
        let region = scheme.classify(config, &trial.params);
        out.entry(region).or_default().push(trial);
    }
    Ok(out)
}

/// Trials of `dataset` that fall into `region`.
pub fn select<'a>(
    dataset: &'a Dataset,
    scheme: &PartitionScheme,
    region: Region,
) -> Result<Vec<&'a SimulationTrial>, PartitionError> {
    if region == Region::Full {
        return Ok(dataset.trials().iter().collect());
    }
    if region.layout() != scheme.layout {
        return Err(PartitionError::LayoutMismatch {
            region,
            layout: scheme.layout.name(),
        });
    }
    let mut parts = partition(dataset, scheme)?;
    Ok(parts.remove(&region).unwrap_or_default())
}
