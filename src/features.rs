//! Feature derivation
//!
//! This module derives higher-order heart-rate features from the analysis window:
//! - HRV surrogate (windowed std-dev) and Cardiac Stability Index
//! - Recovery rate and trend slope
//! - HR acceleration
//! - Smoothed rate of change (`dhr/dt`), carried across ticks

use crate::stats::{ewma, mean, population_std, round_to};
use crate::types::{ExtendedMetrics, Sample};

/// Samples used for the recovery-rate slope
pub const RECOVERY_SAMPLES: usize = 10;

/// Samples used for the instantaneous rate feeding `dhr/dt`
pub const RATE_SAMPLES: usize = 5;

/// Smoothing factor of `dhr/dt`
pub const RATE_ALPHA: f64 = 0.3;

/// Feature deriver holding the smoothed HR rate of change between ticks
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver {
    dhr_dt: f64,
}

impl FeatureDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive features from the analysis window and advance `dhr/dt`
    pub fn derive(&mut self, window: &[Sample]) -> ExtendedMetrics {
        if let Some(rate) = slope(tail(window, RATE_SAMPLES)) {
            self.dhr_dt = ewma(self.dhr_dt, rate, RATE_ALPHA);
        }

        let hr: Vec<f64> = window.iter().map(|s| s.hr).collect();

        ExtendedMetrics {
            hrv: window_std_dev(&hr).map(|sd| round_to(sd, 1)),
            csi: compute_csi(&hr),
            recovery_rate: compute_recovery_rate(window),
            hr_trend_slope: compute_trend_slope(&hr),
            hr_acceleration: compute_acceleration(window),
        }
    }

    /// Smoothed HR rate of change (bpm/s)
    pub fn dhr_dt(&self) -> f64 {
        self.dhr_dt
    }

    pub fn reset(&mut self) {
        self.dhr_dt = 0.0;
    }
}

/// True population std-dev of windowed heart rate.
///
/// Distinct from the baseline's exponential deviation.
pub fn window_std_dev(hr: &[f64]) -> Option<f64> {
    population_std(hr)
}

fn tail(window: &[Sample], n: usize) -> &[Sample] {
    &window[window.len().saturating_sub(n)..]
}

/// `(hr_last - hr_first) / (t_last - t_first)`, if time advanced
fn slope(samples: &[Sample]) -> Option<f64> {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if samples.len() >= 2 => {
            let time_diff = last.t - first.t;
            (time_diff > 0.0).then(|| (last.hr - first.hr) / time_diff)
        }
        _ => None,
    }
}

/// Cardiac Stability Index: `1 - std/mean`, 0 for a non-positive mean
fn compute_csi(hr: &[f64]) -> Option<f64> {
    let hr_mean = mean(hr)?;
    let hr_std = population_std(hr)?;
    if hr_mean <= 0.0 {
        return Some(0.0);
    }
    Some(round_to(1.0 - hr_std / hr_mean, 2))
}

/// Linear rate of change over the last few samples (bpm/s)
fn compute_recovery_rate(window: &[Sample]) -> Option<f64> {
    slope(tail(window, RECOVERY_SAMPLES)).map(|rate| round_to(rate, 1))
}

/// Second-half mean minus first-half mean, per half-window
fn compute_trend_slope(hr: &[f64]) -> Option<f64> {
    if hr.len() < 2 {
        return None;
    }
    let half = hr.len() / 2;
    let first = mean(&hr[..half])?;
    let second = mean(&hr[half..])?;
    Some(round_to((second - first) / (hr.len() as f64 / 2.0), 2))
}

/// Discrete second derivative over the last three samples
fn compute_acceleration(window: &[Sample]) -> Option<f64> {
    let last3 = tail(window, 3);
    if last3.len() < 3 {
        return None;
    }
    let dt = last3[1].t - last3[0].t;
    if dt <= 0.0 {
        return None;
    }
    let accel = (last3[2].hr - 2.0 * last3[1].hr + last3[0].hr) / (dt * dt);
    Some(round_to(accel, 3))
}
