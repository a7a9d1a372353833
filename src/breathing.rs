//! Breathing-rate estimation
//!
//! Respiratory sinus arrhythmia modulates heart rate at the breathing
//! frequency. On every tick the recent heart-rate series is resampled onto a
//! uniform 1 Hz grid, detrended, smoothed, and scanned with a bank of Goertzel
//! filters across the breathing band. The strongest bin is the breathing rate.
//!
//! The grid is coarse (0.02 Hz, about 1.2 breaths/min), which is fine for a
//! wellness readout.

use crate::stats::{ewma, mean, population_std, round_to};
use crate::types::Sample;
use std::collections::VecDeque;

/// Lowest candidate breathing frequency (Hz)
pub const BAND_LOW_HZ: f64 = 0.10;

/// Highest candidate breathing frequency (Hz)
pub const BAND_HIGH_HZ: f64 = 0.50;

/// Spacing of the Goertzel bank (Hz)
pub const BAND_STEP_HZ: f64 = 0.02;

/// Resampling rate of the analysis series (Hz)
pub const RESAMPLE_RATE_HZ: f64 = 1.0;

/// Smoothing factor applied to the detrended series
pub const SMOOTHING_ALPHA: f64 = 0.3;

/// Published breathing rates are clamped to this range (breaths/min)
pub const MIN_BREATHS_PER_MIN: f64 = 6.0;
pub const MAX_BREATHS_PER_MIN: f64 = 30.0;

/// Result of one pass of the filter bank.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BreathingEstimate {
    /// Frequency of the strongest bin, 0 when nothing was found
    pub peak_freq_hz: f64,
    /// Goertzel power of the strongest bin
    pub peak_power: f64,
    /// Breathing rate (breaths/min), rounded to 1 decimal
    pub rate_bpm: Option<f64>,
}

/// Linearly interpolate the samples onto `points` instants spaced
/// `1 / RESAMPLE_RATE_HZ` apart, ending at `end_t`.
///
/// Instants before the first or after the last sample take that sample's value.
/// Samples must be time-ordered.
pub fn resample_uniform(samples: &[Sample], end_t: f64, points: usize) -> Vec<f64> {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };

    let step = 1.0 / RESAMPLE_RATE_HZ;
    let start_t = end_t - step * (points.saturating_sub(1)) as f64;
    let mut cursor = 0;
    let mut out = Vec::with_capacity(points);

    for i in 0..points {
        let t = start_t + step * i as f64;

        if t <= first.t {
            out.push(first.hr);
            continue;
        }
        if t >= last.t {
            out.push(last.hr);
            continue;
        }

        // Grid instants increase, so the bracketing pair only moves forward
        while cursor + 1 < samples.len() && samples[cursor + 1].t < t {
            cursor += 1;
        }
        let a = samples[cursor];
        let b = samples[(cursor + 1).min(samples.len() - 1)];
        let span = b.t - a.t;
        if span <= 0.0 {
            out.push(a.hr);
        } else {
            let frac = (t - a.t) / span;
            out.push(a.hr + (b.hr - a.hr) * frac);
        }
    }

    out
}

/// Subtract the mean in place
pub fn detrend(values: &mut [f64]) {
    if let Some(m) = mean(values) {
        values.iter_mut().for_each(|v| *v -= m);
    }
}

/// Causal exponential smoother seeded with the first value
pub fn smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut state = match values.first() {
        Some(v) => *v,
        None => return out,
    };
    for &v in values {
        state = ewma(state, v, alpha);
        out.push(state);
    }
    out
}

/// Goertzel power of `x` at `freq_hz` for a series sampled at `sample_rate_hz`
pub fn goertzel_power(x: &[f64], freq_hz: f64, sample_rate_hz: f64) -> f64 {
    let omega = 2.0 * std::f64::consts::PI * freq_hz / sample_rate_hz;
    let coeff = 2.0 * omega.cos();

    let mut s_prev = 0.0;
    let mut s_prev2 = 0.0;
    for &v in x {
        let s = v + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2
}

/// Candidate frequencies of the bank, computed by index to avoid drift
pub fn candidate_frequencies() -> impl Iterator<Item = f64> {
    let bins = ((BAND_HIGH_HZ - BAND_LOW_HZ) / BAND_STEP_HZ).round() as usize;
    (0..=bins).map(|k| BAND_LOW_HZ + BAND_STEP_HZ * k as f64)
}

/// Scan the breathing band of a uniform 1 Hz series.
///
/// The series is used as-is; callers detrend and smooth first. Ties keep the
/// lower frequency, and an all-zero spectrum yields no rate.
pub fn dominant_breathing(series: &[f64]) -> BreathingEstimate {
    let mut best_f = 0.0;
    let mut best_p = 0.0;

    for f in candidate_frequencies() {
        let p = goertzel_power(series, f, RESAMPLE_RATE_HZ);
        if p > best_p {
            best_p = p;
            best_f = f;
        }
    }

    let rate_bpm = (best_f > 0.0).then(|| {
        round_to(
            (best_f * 60.0).clamp(MIN_BREATHS_PER_MIN, MAX_BREATHS_PER_MIN),
            1,
        )
    });

    tracing::trace!(peak_freq_hz = best_f, peak_power = best_p, "goertzel bank");

    BreathingEstimate {
        peak_freq_hz: best_f,
        peak_power: best_p,
        rate_bpm,
    }
}

/// Stateful estimator that also remembers recent estimates for window statistics.
#[derive(Debug, Clone)]
pub struct BreathingEstimator {
    window_secs: usize,
    /// (tick instant, rate) of estimates inside the analysis window
    history: VecDeque<(f64, f64)>,
}

impl BreathingEstimator {
    pub fn new(window_secs: usize) -> Self {
        Self {
            window_secs,
            history: VecDeque::new(),
        }
    }

    /// Estimate from window samples (already restricted to the analysis window)
    pub fn estimate(&mut self, window: &[Sample], now: f64) -> BreathingEstimate {
        let mut series = resample_uniform(window, now, self.window_secs);
        detrend(&mut series);
        let smoothed = smooth(&series, SMOOTHING_ALPHA);
        let estimate = dominant_breathing(&smoothed);

        if let Some(rate) = estimate.rate_bpm {
            self.history.push_back((now, rate));
            tracing::debug!(
                rate_bpm = rate,
                peak_freq_hz = estimate.peak_freq_hz,
                peak_power = estimate.peak_power,
                "breathing estimate"
            );
        }

        let cutoff = now - self.window_secs as f64;
        while self.history.front().is_some_and(|(t, _)| *t < cutoff) {
            self.history.pop_front();
        }

        estimate
    }

    /// Mean and population std-dev of the estimates inside the window
    pub fn window_stats(&self) -> Option<(f64, f64)> {
        let rates: Vec<f64> = self.history.iter().map(|(_, r)| *r).collect();
        Some((mean(&rates)?, population_std(&rates)?))
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
