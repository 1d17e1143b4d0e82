//! Synthetic data generation.
//!
//! - `sampler`: draws parameter vectors from the configured priors
//! - `generate`: runs the physical model over many attempts in parallel

pub mod generate;
pub mod sampler;

pub use generate::*;
pub use sampler::*;
