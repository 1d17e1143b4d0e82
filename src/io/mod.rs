//! Input/output helpers.
//!
//! - atomic JSON commits (`atomic`)
//! - dataset files (`dataset`)
//! - the fitted-model store (`model`)

pub mod atomic;
pub mod dataset;
pub mod model;

pub use atomic::*;
pub use dataset::*;
pub use model::*;
