//! `metsim-ml` library crate.
//!
//! The binary (`metsim`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the simulator, generator and fitting driver are reusable from other tools
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
