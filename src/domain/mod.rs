//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - physical parameters and their priors (`ParamName`, `ParamSpec`, `SamplerConfig`)
//! - simulated observations (`ObservableCurve`, `SimulationTrial`)
//! - generation settings and the persisted `Dataset`

pub mod params;
pub mod types;

pub use params::*;
pub use types::*;
