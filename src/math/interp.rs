//! Interpolation helpers and log-spaced grids.

/// Linear interpolation between two knots.
pub fn linear_interp(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    let (x0, y0) = a;
    let (x1, y1) = b;
    if (x1 - x0).abs() < 1e-12 {
        return y0;
    }
    let u = (x - x0) / (x1 - x0);
    y0 + u * (y1 - y0)
}

/// Piecewise-linear interpolation over knots sorted by `x`.
///
/// Outside the knot range the end segments are extended linearly. Returns
/// `None` when fewer than two knots are given.
pub fn interp_knots(knots: &[(f64, f64)], x: f64) -> Option<f64> {
    if knots.len() < 2 {
        return None;
    }
    // Index of the first knot strictly greater than x, clamped to a valid segment.
    let upper = knots.partition_point(|k| k.0 <= x).clamp(1, knots.len() - 1);
    Some(linear_interp(knots[upper - 1], knots[upper], x))
}

/// Sample the series `(xs, ys)` at `x` (xs strictly increasing).
///
/// Values outside `[xs[0], xs[n-1]]` are clamped to the end values.
pub fn sample_series(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let upper = xs[..n].partition_point(|&v| v <= x);
    linear_interp((xs[upper - 1], ys[upper - 1]), (xs[upper], ys[upper]), x)
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
///
/// A degenerate range (`min == max`) yields `steps` copies of `min`. Returns
/// `None` for non-positive or non-finite bounds, `max < min`, or `steps == 0`.
pub fn log_space(min: f64, max: f64, steps: usize) -> Option<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max >= min) || steps == 0 {
        return None;
    }
    if steps == 1 {
        return Some(vec![min]);
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Some(out)
}
