//! Practice reward calculation
//!
//! Converts a finished practice session into an OND payout: a completion part
//! proportional to how much of the session was practiced, and a performance
//! part earned by measurable stress reduction and energy gain.

use crate::error::ComputeError;
use crate::stats::{clamp01, round_to};
use crate::types::{OndReward, PracticeMetrics, Producer, RewardReceipt};
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Share of the base reward paid for completing the session
pub const COMPLETION_SHARE: f64 = 0.15;

/// Share of the base reward paid for reaching the stress target
pub const STRESS_SHARE: f64 = 0.40;

/// Share of the base reward paid for reaching the energy target
pub const ENERGY_SHARE: f64 = 0.45;

/// Relative stress reduction that earns the full stress share
pub const STRESS_TARGET: f64 = 0.10;

/// Relative energy increase that earns the full energy share
pub const ENERGY_TARGET: f64 = 0.10;

/// Smallest "before" value used as a denominator
const MIN_BEFORE_VALUE: f64 = 1.0;

impl PracticeMetrics {
    /// Reject values no session can produce
    pub fn validate(&self) -> Result<(), ComputeError> {
        let durations = [
            ("actual_duration_seconds", self.actual_duration_seconds),
            ("expected_duration_seconds", self.expected_duration_seconds),
            ("base_ond_reward", self.base_ond_reward),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ComputeError::InvalidPracticeMetrics(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        let readings = [
            ("stress_before", self.stress_before),
            ("stress_after", self.stress_after),
            ("energy_before", self.energy_before),
            ("energy_after", self.energy_after),
        ];
        for (name, value) in readings {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ComputeError::InvalidPracticeMetrics(format!(
                        "{name} must be finite, got {v}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Before/after pairs, when the session has usable biometrics
    fn biometrics(&self) -> Option<(f64, f64, f64, f64)> {
        if !self.has_real_metrics {
            return None;
        }
        Some((
            self.stress_before?,
            self.stress_after?,
            self.energy_before?,
            self.energy_after?,
        ))
    }
}

/// Fraction of the expected duration actually practiced, capped at 1
pub fn completion_ratio(actual_seconds: f64, expected_seconds: f64) -> f64 {
    if expected_seconds > 0.0 {
        clamp01(actual_seconds / expected_seconds)
    } else if actual_seconds > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Compute the OND reward for a practice session.
///
/// Without real before/after metrics only the completion part is paid.
/// Zero "before" readings are floored at 1 so the relative change stays finite.
pub fn calculate_practice_ond(metrics: &PracticeMetrics) -> OndReward {
    let base = metrics.base_ond_reward;
    let ratio = completion_ratio(
        metrics.actual_duration_seconds,
        metrics.expected_duration_seconds,
    );
    let completion_ond = base * COMPLETION_SHARE * ratio;
    let completion_pct = (ratio * 100.0).round() as i32;

    let Some((stress_before, stress_after, energy_before, energy_after)) = metrics.biometrics()
    else {
        return OndReward {
            completion_ond: round_to(completion_ond, 2),
            stress_ond: 0.0,
            energy_ond: 0.0,
            performance_ond: 0.0,
            total_ond: round_to(completion_ond, 2),
            completion_pct,
            stress_reduction_pct: None,
            energy_increase_pct: None,
        };
    };

    let stress_reduction = (stress_before - stress_after) / stress_before.max(MIN_BEFORE_VALUE);
    let energy_increase = (energy_after - energy_before) / energy_before.max(MIN_BEFORE_VALUE);

    let stress_score = clamp01(stress_reduction / STRESS_TARGET);
    let energy_score = clamp01(energy_increase / ENERGY_TARGET);

    let stress_ond = base * STRESS_SHARE * stress_score;
    let energy_ond = base * ENERGY_SHARE * energy_score;
    let performance_ond = stress_ond + energy_ond;

    OndReward {
        completion_ond: round_to(completion_ond, 2),
        stress_ond: round_to(stress_ond, 2),
        energy_ond: round_to(energy_ond, 2),
        performance_ond: round_to(performance_ond, 2),
        total_ond: round_to(completion_ond + performance_ond, 2),
        completion_pct,
        stress_reduction_pct: Some((stress_reduction * 100.0).round() as i32),
        energy_increase_pct: Some((energy_increase * 100.0).round() as i32),
    }
}

/// Encoder producing reward receipts for the persistence layer
pub struct RewardEncoder {
    instance_id: String,
}

impl Default for RewardEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RewardEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Validate the metrics and compute a stamped receipt
    pub fn encode(&self, metrics: &PracticeMetrics) -> Result<RewardReceipt, ComputeError> {
        metrics.validate()?;
        let reward = calculate_practice_ond(metrics);

        tracing::debug!(
            total_ond = reward.total_ond,
            performance_ond = reward.performance_ond,
            "practice reward computed"
        );

        Ok(RewardReceipt {
            reward_id: Uuid::new_v4().to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            metrics: metrics.clone(),
            reward,
        })
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, metrics: &PracticeMetrics) -> Result<String, ComputeError> {
        let receipt = self.encode(metrics)?;
        serde_json::to_string_pretty(&receipt).map_err(ComputeError::JsonError)
    }
}
