//! Stress and energy estimation
//!
//! Both scores are a fixed-weight blend of the sigmoid of the heart-rate and
//! motion z-scores plus a breathing-stability term, scaled to `[0, 100]`.

use crate::stats::{clamp01, sigmoid, to_percent};
use crate::types::BaselineSnapshot;

const HR_WEIGHT: f64 = 0.6;
const ACTIVITY_WEIGHT: f64 = 0.3;
const BREATH_WEIGHT: f64 = 0.1;

/// Goertzel peak power that counts as fully stable breathing
pub const BREATH_STABILITY_POWER: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressEnergy {
    pub stress: u8,
    pub energy: u8,
}

impl StressEnergy {
    pub fn stress01(&self) -> f64 {
        f64::from(self.stress) / 100.0
    }

    pub fn energy01(&self) -> f64 {
        f64::from(self.energy) / 100.0
    }
}

/// Z-score against a baseline deviation, never dividing by less than 1
pub fn baseline_z(value: f64, mean: f64, deviation: f64) -> f64 {
    (value - mean) / deviation.max(1.0)
}

/// Map the strongest breathing-band power to a rough `[0, 1]` stability
pub fn breath_stability(peak_power: f64) -> f64 {
    (peak_power / BREATH_STABILITY_POWER).min(1.0)
}

/// Score stress and energy for the latest heart rate and motion magnitude.
pub fn estimate(
    hr: f64,
    activity: f64,
    baseline: &BaselineSnapshot,
    peak_power: f64,
) -> StressEnergy {
    let z_hr = baseline_z(hr, baseline.hr_mean, baseline.hr_deviation);
    let z_act = baseline_z(activity, baseline.act_mean, baseline.act_deviation);
    let stability = breath_stability(peak_power);

    let s_hr = sigmoid(z_hr);
    let s_act = sigmoid(z_act);

    let stress = clamp01(
        HR_WEIGHT * s_hr + ACTIVITY_WEIGHT * s_act + BREATH_WEIGHT * (1.0 - stability),
    );
    let energy = clamp01(
        HR_WEIGHT * (1.0 - s_hr) + ACTIVITY_WEIGHT * (1.0 - s_act) + BREATH_WEIGHT * stability,
    );

    StressEnergy {
        stress: to_percent(stress),
        energy: to_percent(energy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(hr_mean: f64, hr_deviation: f64) -> BaselineSnapshot {
        BaselineSnapshot {
            hr_mean,
            hr_deviation,
            ready: true,
            sample_count: 121,
            ..Default::default()
        }
    }

    #[test]
    fn test_at_baseline_is_balanced() {
        // z = 0 on both inputs, no breathing power
        let scores = estimate(70.0, 0.0, &baseline(70.0, 3.0), 0.0);
        // 0.6*0.5 + 0.3*0.5 + 0.1 = 0.55
        assert_eq!(scores.stress, 55);
        // 0.6*0.5 + 0.3*0.5 + 0 = 0.45
        assert_eq!(scores.energy, 45);
    }

    #[test]
    fn test_stable_breathing_shifts_toward_energy() {
        let scores = estimate(70.0, 0.0, &baseline(70.0, 3.0), 1000.0);
        assert_eq!(scores.stress, 45);
        assert_eq!(scores.energy, 55);
    }

    #[test]
    fn test_weights_with_unequal_z_scores() {
        // zHr = 6/3 = 2, zAct = (0 - 1)/max(1, 0.5) = -1, stability 0.5
        let snapshot = BaselineSnapshot {
            act_mean: 1.0,
            act_deviation: 0.5,
            ..baseline(70.0, 3.0)
        };
        let scores = estimate(76.0, 0.0, &snapshot, 100.0);
        // 0.6*0.8808 + 0.3*0.2689 + 0.1*0.5 = 0.6592
        assert_eq!(scores.stress, 66);
        // 0.6*0.1192 + 0.3*0.7311 + 0.1*0.5 = 0.3408
        assert_eq!(scores.energy, 34);
    }

    #[test]
    fn test_elevated_hr_raises_stress() {
        let calm = estimate(70.0, 0.0, &baseline(70.0, 2.0), 50.0);
        let tense = estimate(90.0, 0.0, &baseline(70.0, 2.0), 50.0);
        assert!(tense.stress > calm.stress);
        assert!(tense.energy < calm.energy);
    }

    #[test]
    fn test_small_deviation_is_floored() {
        assert_eq!(baseline_z(75.0, 70.0, 0.01), 5.0);
        assert_eq!(baseline_z(75.0, 70.0, 2.5), 2.0);
    }

    #[test]
    fn test_scores_bounded() {
        for hr in [-500.0, 0.0, 40.0, 70.0, 200.0, 1e6] {
            for act in [0.0, 1.0, 100.0] {
                for power in [0.0, 199.0, 1e9] {
                    let s = estimate(hr, act, &baseline(70.0, 0.0), power);
                    assert!(s.stress <= 100 && s.energy <= 100);
                }
            }
        }
    }
}
