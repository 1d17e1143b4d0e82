//! Atmospheric mass density versus height.
//!
//! Densities come from the US Standard Atmosphere 1976 between 60 and 200 km
//! and are interpolated linearly in `ln(rho)`. Outside the table the end
//! segments are extended, which keeps the profile exponential.

use crate::math::interp_knots;

/// (height in m, density in kg/m³)
const US_STANDARD_1976: [(f64, f64); 15] = [
    (60_000.0, 3.097e-4),
    (70_000.0, 8.283e-5),
    (80_000.0, 1.846e-5),
    (90_000.0, 3.416e-6),
    (100_000.0, 5.604e-7),
    (110_000.0, 9.708e-8),
    (120_000.0, 2.222e-8),
    (130_000.0, 8.152e-9),
    (140_000.0, 3.831e-9),
    (150_000.0, 2.076e-9),
    (160_000.0, 1.233e-9),
    (170_000.0, 7.815e-10),
    (180_000.0, 5.194e-10),
    (190_000.0, 3.581e-10),
    (200_000.0, 2.541e-10),
];

#[derive(Debug, Clone)]
pub struct Atmosphere {
    /// (height, ln density), sorted by height.
    log_knots: Vec<(f64, f64)>,
}

impl Atmosphere {
    pub fn us_standard() -> Self {
        Self {
            log_knots: US_STANDARD_1976
                .iter()
                .map(|&(h, rho)| (h, rho.ln()))
                .collect(),
        }
    }

    /// Air density (kg/m³) at height `h` (m).
    pub fn density(&self, h: f64) -> f64 {
        interp_knots(&self.log_knots, h).map_or(0.0, f64::exp)
    }
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self::us_standard()
    }
}
