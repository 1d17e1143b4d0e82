//! Feature and label extraction: the fixed contract between the dataset and
//! any regression trainer.
//!
//! A curve becomes `4 × data_length` values, interleaved per camera frame as
//! `[time, height, length, magnitude]`:
//!
//! 1. resample at the camera frame rate (linear interpolation), time shifted
//!    to start at 0;
//! 2. zero lengths before `len_delay`, then measure lengths relative to the
//!    first frame at or after it;
//! 3. optionally add Gaussian noise to magnitudes and measured lengths;
//! 4. normalize each channel to roughly `[0, 1]`;
//! 5. truncate, or zero-pad at the end, to `data_length` frames.
//!
//! Labels are the free parameters in canonical order, normalized into the
//! sampling space of their prior.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::split_seed;
use crate::domain::{ObservableCurve, ObservationConfig, ParamName, ParameterVector, SamplerConfig};
use crate::error::FittingError;
use crate::math::sample_series;

/// Values per camera frame.
pub const CHANNELS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureOptions {
    /// Add measurement noise (`mag_noise`, `len_noise`).
    pub noise: bool,
    /// Noise for trial `id` is drawn from `split_seed(seed, id)`.
    pub seed: u64,
}

pub fn feature_len(obs: &ObservationConfig) -> usize {
    CHANNELS * obs.data_length
}

/// Feature vector of one curve.
pub fn extract_features(
    curve: &ObservableCurve,
    obs: &ObservationConfig,
    sampler: &SamplerConfig,
    options: &FeatureOptions,
    trial_id: u64,
) -> Result<Vec<f64>, FittingError> {
    let fail = |reason: &str| FittingError::Features {
        trial: trial_id,
        reason: reason.to_string(),
    };

    let (Some(first), Some(last)) = (curve.samples.first(), curve.samples.last()) else {
        return Err(fail("empty curve"));
    };
    let span = last.time - first.time;
    if !(span > 0.0) {
        return Err(fail("curve spans no time"));
    }
    let v_max = sampler
        .spec(ParamName::VInit)
        .map(|s| s.max)
        .ok_or_else(|| fail("sampler config has no v_init spec"))?;

    let times: Vec<f64> = curve.samples.iter().map(|s| s.time).collect();
    let heights: Vec<f64> = curve.samples.iter().map(|s| s.height).collect();
    let lengths: Vec<f64> = curve.samples.iter().map(|s| s.length).collect();
    let mags: Vec<f64> = curve.samples.iter().map(|s| s.magnitude).collect();

    // Frames at t0, t0 + 1/fps, ... strictly before the last sample.
    let frames = ((span * obs.fps).ceil() as usize).max(1);
    let frame_time = |i: usize| i as f64 / obs.fps;
    let resample = |ys: &[f64]| -> Vec<f64> {
        (0..frames)
            .map(|i| sample_series(&times, ys, first.time + frame_time(i)))
            .collect()
    };
    let frame_ht = resample(&heights);
    let mut frame_len = resample(&lengths);
    let mut frame_mag = resample(&mags);

    let Some(delay_idx) = (0..frames).find(|&i| frame_time(i) >= obs.len_delay) else {
        return Err(fail("length delay exceeds the visible duration"));
    };
    let origin = frame_len[delay_idx];
    for (i, l) in frame_len.iter_mut().enumerate() {
        *l = if i < delay_idx { 0.0 } else { *l - origin };
    }
    if !frame_len.iter().any(|&l| l > 0.0) {
        return Err(fail("no length measurements"));
    }

    if options.noise {
        let mag_noise = Normal::new(0.0, obs.mag_noise)
            .map_err(|e| fail(&format!("magnitude noise: {e}")))?;
        let len_noise = Normal::new(0.0, obs.len_noise)
            .map_err(|e| fail(&format!("length noise: {e}")))?;
        let mut rng = StdRng::seed_from_u64(split_seed(options.seed, trial_id));
        for m in frame_mag.iter_mut() {
            *m += mag_noise.sample(&mut rng);
        }
        for l in frame_len.iter_mut().skip(delay_idx) {
            *l += len_noise.sample(&mut rng);
        }
    }

    let len_max = v_max * obs.data_length as f64 / obs.fps;
    let ht_span = obs.ht_max - obs.ht_min;
    let mag_span = obs.mag_faintest - obs.mag_brightest;

    let mut out = vec![0.0; feature_len(obs)];
    for i in 0..frames.min(obs.data_length) {
        let row = &mut out[CHANNELS * i..CHANNELS * (i + 1)];
        row[0] = frame_time(i) / obs.max_duration;
        row[1] = (frame_ht[i] - obs.ht_min) / ht_span;
        row[2] = frame_len[i] / len_max;
        row[3] = (obs.mag_faintest - frame_mag[i]) / mag_span;
    }

    if out.iter().any(|v| !v.is_finite()) {
        return Err(fail("non-finite feature"));
    }
    Ok(out)
}

/// Normalized values of `free` parameters, in the given order.
pub fn extract_labels(params: &ParameterVector, sampler: &SamplerConfig, free: &[ParamName]) -> Vec<f64> {
    free.iter()
        .map(|&name| {
            sampler
                .spec(name)
                .map_or(0.0, |spec| spec.normalize(params.get(name)))
        })
        .collect()
}
