//! Reduce a full simulated trajectory to what the camera records.
//!
//! A sample is visible when it is brighter than the limiting magnitude and
//! inside the observed height window. The leading edge is cut at
//! `lim_mag_start`, the trailing edge at `lim_mag_end`. Visibility is decided
//! per sample, so a faint dip between the edges leaves a gap in time.

use crate::domain::{ObservableCurve, ObservationConfig, TerminationReason};
use crate::error::SimulationError;

/// Visible portion of `full`, or why there is none worth keeping.
pub fn observable_window(
    full: &ObservableCurve,
    obs: &ObservationConfig,
) -> Result<ObservableCurve, SimulationError> {
    let visible = visibility_mask(full, obs);
    let n_visible = visible.iter().filter(|&&v| v).count();

    if full.termination == TerminationReason::TimeLimit && visible.last().copied().unwrap_or(false) {
        let time = full.samples.last().map_or(0.0, |s| s.time);
        return Err(SimulationError::Timeout { time });
    }

    let peak = full.peak_magnitude().unwrap_or(f64::INFINITY);
    if peak >= obs.peak_mag_faintest || n_visible < obs.min_visible_samples.max(1) {
        return Err(SimulationError::NoSignal { visible: n_visible });
    }

    let samples: Vec<_> = full
        .samples
        .iter()
        .zip(&visible)
        .filter_map(|(s, &v)| v.then_some(*s))
        .collect();

    let curve = ObservableCurve {
        samples,
        termination: full.termination,
    };
    if curve.duration() < obs.visibility_time_min {
        return Err(SimulationError::NoSignal { visible: n_visible });
    }

    Ok(curve)
}

fn visibility_mask(full: &ObservableCurve, obs: &ObservationConfig) -> Vec<bool> {
    let n = full.samples.len();
    let mag = |i: usize| full.samples[i].magnitude;

    let Some(first) = (0..n).find(|&i| mag(i) <= obs.lim_mag_start) else {
        return vec![false; n];
    };
    // If the meteor is still bright at the end there is no trailing cut.
    let last = if n > 0 && mag(n - 1) > obs.lim_mag_end {
        (0..n).rev().find(|&i| mag(i) <= obs.lim_mag_end).unwrap_or(0)
    } else {
        n.saturating_sub(1)
    };

    let min_lim = obs.lim_mag_start.min(obs.lim_mag_end);
    full.samples
        .iter()
        .enumerate()
        .map(|(i, s)| {
            i >= first
                && i <= last
                && s.magnitude < min_lim
                && s.height >= obs.ht_min
                && s.height <= obs.ht_max
        })
        .collect()
}
