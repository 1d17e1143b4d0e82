//! Mathematical utilities: interpolation, ODE stepping and least squares.

pub mod interp;
pub mod ode;
pub mod ols;

pub use interp::*;
pub use ode::*;
pub use ols::*;
