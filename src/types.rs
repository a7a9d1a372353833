//! Core types for the Pulse Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw samples, baseline state, derived metrics, the published vitals
//! snapshot and the practice reward value objects.

use serde::{Deserialize, Serialize};

/// A single heart-rate reading from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp in seconds (monotonic within a session)
    pub t: f64,
    /// Heart rate (bpm)
    pub hr: f64,
}

impl Sample {
    pub fn new(t: f64, hr: f64) -> Self {
        Self { t, hr }
    }
}

/// Read-only view of the running baseline.
///
/// The `*_deviation` fields are exponential mean-absolute-deviation estimates,
/// not variances. Downstream z-scoring divides by them directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    /// Heart rate running mean (bpm)
    pub hr_mean: f64,
    /// Heart rate running deviation (bpm)
    pub hr_deviation: f64,
    /// Breathing rate running mean (breaths/min)
    pub br_mean: f64,
    /// Breathing rate running deviation (breaths/min)
    pub br_deviation: f64,
    /// Motion magnitude running mean
    pub act_mean: f64,
    /// Motion magnitude running deviation
    pub act_deviation: f64,
    /// Latched once warm-up completes; HR/activity updates stop afterwards
    pub ready: bool,
    /// HR/activity updates applied so far
    pub sample_count: u32,
}

/// Metrics derived from the analysis window on each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedMetrics {
    /// HRV surrogate: population std-dev of windowed HR (1 decimal)
    pub hrv: Option<f64>,
    /// Cardiac Stability Index: 1 - std/mean (2 decimals)
    pub csi: Option<f64>,
    /// HR slope over the last 10 samples, bpm/s (1 decimal)
    pub recovery_rate: Option<f64>,
    /// Second-half vs first-half mean HR per half-window (2 decimals)
    pub hr_trend_slope: Option<f64>,
    /// Discrete second derivative over the last 3 samples (3 decimals)
    pub hr_acceleration: Option<f64>,
}

/// Six derived emotional indices, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionalIndices {
    pub arousal: u8,
    pub calm: u8,
    pub focus: u8,
    pub excitement: u8,
    pub fatigue: u8,
    pub flow: u8,
}

/// Published vitals, recomputed on every effective tick.
///
/// Every field stays `None` until enough data exists to compute it, and keeps
/// its previous value when a tick has to be skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    /// Tick instant (seconds) this snapshot was computed at
    pub t: Option<f64>,
    /// Latest heart rate (bpm)
    pub hr: Option<f64>,
    /// Breathing rate (breaths/min), always within `[6, 30]`
    pub br: Option<f64>,
    /// Stress score `[0, 100]`
    pub stress: Option<u8>,
    /// Energy score `[0, 100]`
    pub energy: Option<u8>,
    pub hrv: Option<f64>,
    pub csi: Option<f64>,
    pub recovery_rate: Option<f64>,
    pub hr_trend_slope: Option<f64>,
    pub hr_acceleration: Option<f64>,
    pub arousal: Option<u8>,
    pub calm: Option<u8>,
    pub focus: Option<u8>,
    pub excitement: Option<u8>,
    pub fatigue: Option<u8>,
    pub flow: Option<u8>,
}

impl VitalsSnapshot {
    /// Overlay freshly computed metrics, keeping previous values where a metric
    /// could not be computed this tick.
    pub fn apply_metrics(&mut self, metrics: &ExtendedMetrics) {
        self.hrv = metrics.hrv.or(self.hrv);
        self.csi = metrics.csi.or(self.csi);
        self.recovery_rate = metrics.recovery_rate.or(self.recovery_rate);
        self.hr_trend_slope = metrics.hr_trend_slope.or(self.hr_trend_slope);
        self.hr_acceleration = metrics.hr_acceleration.or(self.hr_acceleration);
    }

    pub fn apply_emotions(&mut self, indices: &EmotionalIndices) {
        self.arousal = Some(indices.arousal);
        self.calm = Some(indices.calm);
        self.focus = Some(indices.focus);
        self.excitement = Some(indices.excitement);
        self.fatigue = Some(indices.fatigue);
        self.flow = Some(indices.flow);
    }

    /// The six indices, if they have been computed at least once
    pub fn emotional_indices(&self) -> Option<EmotionalIndices> {
        Some(EmotionalIndices {
            arousal: self.arousal?,
            calm: self.calm?,
            focus: self.focus?,
            excitement: self.excitement?,
            fatigue: self.fatigue?,
            flow: self.flow?,
        })
    }
}

/// Session measurements handed to the reward calculator at session end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeMetrics {
    /// How long the user actually practiced (seconds)
    pub actual_duration_seconds: f64,
    /// Nominal practice length (seconds)
    pub expected_duration_seconds: f64,
    #[serde(default)]
    pub stress_before: Option<f64>,
    #[serde(default)]
    pub stress_after: Option<f64>,
    #[serde(default)]
    pub energy_before: Option<f64>,
    #[serde(default)]
    pub energy_after: Option<f64>,
    /// Full reward for a perfect session
    pub base_ond_reward: f64,
    /// Whether the before/after values come from a real sensor
    #[serde(default)]
    pub has_real_metrics: bool,
}

/// Currency payout for a practice session. All amounts have 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OndReward {
    pub completion_ond: f64,
    pub stress_ond: f64,
    pub energy_ond: f64,
    pub performance_ond: f64,
    pub total_ond: f64,
    /// Completion ratio as an integer percentage
    pub completion_pct: i32,
    /// Relative stress reduction as an integer percentage
    pub stress_reduction_pct: Option<i32>,
    /// Relative energy increase as an integer percentage
    pub energy_increase_pct: Option<i32>,
}

/// Producer metadata stamped on reward receipts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Reward document handed to the persistence collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardReceipt {
    pub reward_id: String,
    pub producer: Producer,
    pub computed_at_utc: String,
    pub metrics: PracticeMetrics,
    pub reward: OndReward,
}
