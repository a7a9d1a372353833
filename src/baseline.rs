//! Baseline management
//!
//! This module maintains slowly adapting running baselines for heart rate,
//! breathing rate and motion, used to z-score the live signal.
//!
//! Heart rate and motion adapt only during warm-up: once the update count
//! exceeds the warm-up length the baseline latches `ready` and stops moving.
//! The breathing baseline never freezes.

use crate::config::DEFAULT_BASELINE_WARMUP;
use crate::types::BaselineSnapshot;

/// Weight kept by the previous estimate on each update
pub const BASELINE_DECAY: f64 = 0.99;

/// Weight given to the new observation on each update
pub const BASELINE_GAIN: f64 = 0.01;

/// Exponential running mean with a mean-absolute-deviation spread.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RunningLevel {
    mean: f64,
    deviation: f64,
}

impl RunningLevel {
    fn seed(value: f64) -> Self {
        Self {
            mean: value,
            deviation: 0.0,
        }
    }

    fn update(&mut self, value: f64) {
        self.mean = self.mean * BASELINE_DECAY + value * BASELINE_GAIN;
        self.deviation = self.deviation * BASELINE_DECAY + (value - self.mean).abs() * BASELINE_GAIN;
    }
}

/// Per-session baseline tracker
#[derive(Debug, Clone)]
pub struct BaselineTracker {
    hr: RunningLevel,
    activity: RunningLevel,
    breathing: RunningLevel,
    /// HR/activity updates applied
    sample_count: u32,
    /// Breathing updates applied
    breathing_count: u32,
    warmup: u32,
    ready: bool,
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WARMUP)
    }
}

impl BaselineTracker {
    /// Create a tracker that latches after `warmup` HR/activity updates
    pub fn new(warmup: u32) -> Self {
        Self {
            hr: RunningLevel::default(),
            activity: RunningLevel::default(),
            breathing: RunningLevel::default(),
            sample_count: 0,
            breathing_count: 0,
            warmup,
            ready: false,
        }
    }

    /// Feed the latest heart rate and motion magnitude. No-op once ready.
    pub fn update(&mut self, hr: f64, activity: f64) {
        if self.ready {
            return;
        }

        self.sample_count += 1;
        if self.sample_count == 1 {
            self.hr = RunningLevel::seed(hr);
            self.activity = RunningLevel::seed(activity);
        } else {
            self.hr.update(hr);
            self.activity.update(activity);
        }

        if self.sample_count > self.warmup {
            self.ready = true;
            tracing::debug!(
                hr_mean = self.hr.mean,
                hr_deviation = self.hr.deviation,
                samples = self.sample_count,
                "baseline warm-up complete, heart-rate baseline frozen"
            );
        }
    }

    /// Feed a new breathing-rate estimate. Always applied, even when ready.
    pub fn update_breathing(&mut self, br: f64) {
        self.breathing_count += 1;
        if self.breathing_count == 1 {
            self.breathing = RunningLevel::seed(br);
        } else {
            self.breathing.update(br);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Whether any breathing estimate has been folded in yet
    pub fn has_breathing(&self) -> bool {
        self.breathing_count > 0
    }

    pub fn snapshot(&self) -> BaselineSnapshot {
        BaselineSnapshot {
            hr_mean: self.hr.mean,
            hr_deviation: self.hr.deviation,
            br_mean: self.breathing.mean,
            br_deviation: self.breathing.deviation,
            act_mean: self.activity.mean,
            act_deviation: self.activity.deviation,
            ready: self.ready,
            sample_count: self.sample_count,
        }
    }

    /// Forget everything, e.g. when the device disconnects
    pub fn reset(&mut self) {
        *self = Self::new(self.warmup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_flips_after_warmup_boundary() {
        let mut tracker = BaselineTracker::default();

        for _ in 0..120 {
            tracker.update(70.0, 0.1);
        }
        assert_eq!(tracker.sample_count(), 120);
        assert!(!tracker.is_ready());

        tracker.update(70.0, 0.1);
        assert_eq!(tracker.sample_count(), 121);
        assert!(tracker.is_ready());
    }

    #[test]
    fn test_hr_baseline_freezes_once_ready() {
        let mut tracker = BaselineTracker::new(5);
        for _ in 0..6 {
            tracker.update(60.0, 0.0);
        }
        assert!(tracker.is_ready());
        let frozen = tracker.snapshot();

        for _ in 0..50 {
            tracker.update(120.0, 3.0);
        }

        let after = tracker.snapshot();
        assert_eq!(after.hr_mean, frozen.hr_mean);
        assert_eq!(after.act_mean, frozen.act_mean);
        assert_eq!(after.sample_count, 6);
    }

    #[test]
    fn test_breathing_baseline_never_freezes() {
        let mut tracker = BaselineTracker::new(2);
        for _ in 0..3 {
            tracker.update(60.0, 0.0);
        }
        assert!(tracker.is_ready());

        tracker.update_breathing(12.0);
        assert_eq!(tracker.snapshot().br_mean, 12.0);

        tracker.update_breathing(20.0);
        let snap = tracker.snapshot();
        // 12 * 0.99 + 20 * 0.01
        assert!((snap.br_mean - 12.08).abs() < 1e-9);
        // |20 - 12.08| * 0.01
        assert!((snap.br_deviation - 0.0792).abs() < 1e-9);
    }

    #[test]
    fn test_deviation_is_mean_absolute_style() {
        let mut tracker = BaselineTracker::default();
        tracker.update(70.0, 0.0);
        tracker.update(80.0, 0.0);

        let snap = tracker.snapshot();
        assert!((snap.hr_mean - 70.1).abs() < 1e-9);
        assert!((snap.hr_deviation - 0.099).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut tracker = BaselineTracker::new(1);
        tracker.update(70.0, 0.0);
        tracker.update(70.0, 0.0);
        tracker.update_breathing(14.0);
        assert!(tracker.is_ready());

        tracker.reset();
        assert!(!tracker.is_ready());
        assert!(!tracker.has_breathing());
        assert_eq!(tracker.snapshot(), BaselineSnapshot::default());
    }
}
