//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - partition a dataset into regions of interest (`region`)
//! - turn curves into fixed-length features and labels (`features`)
//! - split a subset into training groups (`grouping`)
//! - dispatch groups to a trainer and collect the fitted model (`driver`, `trainer`)

pub mod driver;
pub mod features;
pub mod grouping;
pub mod region;
pub mod trainer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use driver::*;
pub use features::*;
pub use grouping::*;
pub use region::*;
pub use trainer::*;
