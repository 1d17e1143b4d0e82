//! Physical model of a meteoroid entering the atmosphere.
//!
//! - `atmosphere`: air density profile
//! - `ablation`: single-body ablation/erosion integrator
//! - `observe`: reduction of a full trajectory to what a camera records

pub mod ablation;
pub mod atmosphere;
pub mod observe;

pub use ablation::*;
pub use atmosphere::*;
pub use observe::*;

use crate::domain::{ObservableCurve, ParameterVector};
use crate::error::SimulationError;

/// Anything that turns a parameter vector into an observable curve.
///
/// Implementations must be deterministic: identical inputs give identical
/// curves. The batch generator calls this from many threads at once.
pub trait TrajectoryModel: Sync {
    fn simulate(
        &self,
        params: &ParameterVector,
        erosion_enabled: bool,
    ) -> Result<ObservableCurve, SimulationError>;
}
