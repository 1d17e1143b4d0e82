//! Fixed-step Runge–Kutta stepping for small state vectors.

/// Advance `y` by one classic RK4 step of size `dt`.
///
/// `f` returns the time derivative of the state; the system is autonomous
/// (time never enters the derivative).
pub fn rk4_step<const N: usize>(y: &[f64; N], dt: f64, f: impl Fn(&[f64; N]) -> [f64; N]) -> [f64; N] {
    let k1 = f(y);
    let k2 = f(&axpy(y, 0.5 * dt, &k1));
    let k3 = f(&axpy(y, 0.5 * dt, &k2));
    let k4 = f(&axpy(y, dt, &k3));

    let mut out = *y;
    for i in 0..N {
        out[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    out
}

/// `y + a * x`
fn axpy<const N: usize>(y: &[f64; N], a: f64, x: &[f64; N]) -> [f64; N] {
    let mut out = *y;
    for i in 0..N {
        out[i] += a * x[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rk4_integrates_exponential_decay() {
        // y' = -y, y(0) = 1 -> y(1) = e^-1
        let mut y = [1.0];
        let dt = 0.01;
        for _ in 0..100 {
            y = rk4_step(&y, dt, |s| [-s[0]]);
        }
        assert!((y[0] - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn rk4_is_exact_for_constant_velocity() {
        // x' = v, v' = 0
        let y = rk4_step(&[0.0, 3.0], 0.5, |s| [s[1], 0.0]);
        assert!((y[0] - 1.5).abs() < 1e-12);
        assert_eq!(y[1], 3.0);
    }
}
