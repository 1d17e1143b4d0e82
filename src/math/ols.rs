//! Least squares solver.
//!
//! The linear trainer reduces every fit to one dense problem
//!
//! ```text
//! minimize ‖X B - Y‖²
//! ```
//!
//! with several right-hand side columns (one per label).
//!
//! Implementation choices:
//! - SVD, so rank-deficient or tall systems still solve. (Nalgebra's
//!   `QR::solve` is intended for square systems.)
//! - One decomposition shared by all label columns.

use nalgebra::DMatrix;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DMatrix::from_row_slice(3, 1, &[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[(0, 0)] - 2.0).abs() < 1e-10);
        assert!((beta[(1, 0)] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_handles_several_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        // Column 0: y = 1 + x, column 1: y = -x
        let y = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, -1.0, 3.0, -2.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[(0, 0)] - 1.0).abs() < 1e-10);
        assert!((beta[(1, 0)] - 1.0).abs() < 1e-10);
        assert!(beta[(0, 1)].abs() < 1e-10);
        assert!((beta[(1, 1)] + 1.0).abs() < 1e-10);
    }
}
