//! Emotional indices
//!
//! A pure mapping from the current vitals, their baselines and a few derived
//! terms to six named indices. Each index is a weighted blend of normalized
//! sub-signals, clamped to `[0, 1]` and reported as an integer percentage.
//! The weights are empirical constants and must not be tuned per user.

use crate::stats::{clamp01, to_percent};
use crate::types::EmotionalIndices;
use serde::{Deserialize, Serialize};

/// Inputs to [`calculate_emotional_indices`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionInputs {
    /// Current heart rate (bpm)
    pub hr: f64,
    /// Current breathing rate (breaths/min)
    pub br: f64,
    /// Baseline heart-rate mean
    pub hr0: f64,
    /// Baseline heart-rate deviation
    pub hr_std: f64,
    /// Baseline breathing-rate mean
    pub br0: f64,
    /// Baseline breathing-rate deviation
    pub br_std: f64,
    /// Population std-dev of heart rate over the analysis window
    pub hr_std_win: f64,
    /// Mean of breathing estimates over the analysis window
    pub br_mean_win: f64,
    /// Std-dev of breathing estimates over the analysis window
    pub br_std_win: f64,
    /// Smoothed heart-rate rate of change (bpm/s)
    pub dhr_dt: f64,
    /// Energy score in `[0, 1]`
    pub energy01: f64,
    /// Stress score in `[0, 1]`
    pub stress01: f64,
}

/// Map a z-score onto `[0, 1]`, centered at 0.5
fn z01(z: f64) -> f64 {
    clamp01(0.5 + z / 6.0)
}

/// Triangular closeness of `x` to `target` with half-width `radius`
fn mid(x: f64, target: f64, radius: f64) -> f64 {
    clamp01(1.0 - (x - target).abs() / radius)
}

fn blend(terms: &[(f64, f64)]) -> u8 {
    to_percent(terms.iter().map(|(w, v)| w * v).sum())
}

/// Compute the six emotional indices. Identical inputs give identical outputs.
pub fn calculate_emotional_indices(input: &EmotionInputs) -> EmotionalIndices {
    let h = z01((input.hr - input.hr0) / input.hr_std.max(1.0));
    let b = z01((input.br - input.br0) / input.br_std.max(1.0));

    // breathing stability, low HR variability, positive HR drift
    let s_br = clamp01(1.0 - (input.br_std_win / input.br_mean_win.max(1.0)) / 0.40);
    let l_hrv = clamp01(1.0 - input.hr_std_win / 6.0);
    let r = clamp01(input.dhr_dt.max(0.0) / 0.5);

    let calm_stress = 1.0 - input.stress01;

    EmotionalIndices {
        arousal: blend(&[(0.50, h), (0.30, b), (0.20, r)]),
        calm: blend(&[(0.50, 1.0 - h), (0.30, s_br), (0.20, calm_stress)]),
        focus: blend(&[(0.50, mid(h, 0.55, 0.30)), (0.30, l_hrv), (0.20, s_br)]),
        excitement: blend(&[(0.60, r), (0.30, h), (0.10, b)]),
        fatigue: blend(&[(0.50, h), (0.20, b), (0.30, 1.0 - input.energy01)]),
        flow: blend(&[(0.50, mid(h, 0.55, 0.25)), (0.30, s_br), (0.20, calm_stress)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resting() -> EmotionInputs {
        EmotionInputs {
            hr: 70.0,
            br: 12.0,
            hr0: 70.0,
            hr_std: 3.0,
            br0: 12.0,
            br_std: 1.0,
            hr_std_win: 3.0,
            br_mean_win: 12.0,
            br_std_win: 0.0,
            dhr_dt: 0.0,
            energy01: 0.5,
            stress01: 0.5,
        }
    }

    #[test]
    fn test_at_baseline() {
        // h = b = 0.5, Sbr = 1, Lhrv = 0.5, R = 0
        let indices = calculate_emotional_indices(&resting());
        assert_eq!(
            indices,
            EmotionalIndices {
                arousal: 40,    // 0.25 + 0.15
                calm: 65,       // 0.25 + 0.30 + 0.10
                focus: 77,      // 0.5*(1 - 0.05/0.30) + 0.15 + 0.20
                excitement: 20, // 0.15 + 0.05
                fatigue: 50,    // 0.25 + 0.10 + 0.15
                flow: 80,       // 0.5*(1 - 0.05/0.25) + 0.30 + 0.10
            }
        );
    }

    #[test]
    fn test_off_baseline_weights() {
        // h = z01(6/5) = 0.7, b = z01(-1) = 1/3, R = 0.4, Sbr = 0.8, Lhrv = 0.5
        let input = EmotionInputs {
            hr: 76.0,
            br: 11.0,
            hr_std: 5.0,
            hr_std_win: 3.0,
            br_std_win: 0.96,
            dhr_dt: 0.2,
            energy01: 0.3,
            stress01: 0.7,
            ..resting()
        };
        assert_eq!(
            calculate_emotional_indices(&input),
            EmotionalIndices {
                arousal: 53,    // 0.35 + 0.10 + 0.08
                calm: 45,       // 0.15 + 0.24 + 0.06
                focus: 56,      // 0.5*0.5 + 0.15 + 0.16
                excitement: 48, // 0.24 + 0.21 + 0.0333
                fatigue: 63,    // 0.35 + 0.0667 + 0.21
                flow: 50,       // 0.5*0.4 + 0.24 + 0.06
            }
        );
    }

    #[test]
    fn test_idempotent() {
        let input = EmotionInputs {
            hr: 88.0,
            dhr_dt: 0.4,
            ..resting()
        };
        assert_eq!(
            calculate_emotional_indices(&input),
            calculate_emotional_indices(&input)
        );
    }

    #[test]
    fn test_rising_hr_raises_arousal_and_excitement() {
        let base = calculate_emotional_indices(&resting());
        let aroused = calculate_emotional_indices(&EmotionInputs {
            hr: 85.0,
            dhr_dt: 0.6,
            ..resting()
        });
        assert!(aroused.arousal > base.arousal);
        assert!(aroused.excitement > base.excitement);
        assert!(aroused.calm < base.calm);
    }

    #[test]
    fn test_bounded_for_extreme_inputs() {
        let extremes = [-1e9, -50.0, 0.0, 0.5, 50.0, 1e9];
        for &x in &extremes {
            for &y in &extremes {
                let input = EmotionInputs {
                    hr: x,
                    br: y,
                    hr_std: 0.0,
                    br_std: -3.0,
                    hr_std_win: y.abs(),
                    br_mean_win: x,
                    br_std_win: y.abs(),
                    dhr_dt: x,
                    energy01: y,
                    stress01: x,
                    ..resting()
                };
                let i = calculate_emotional_indices(&input);
                for v in [i.arousal, i.calm, i.focus, i.excitement, i.fatigue, i.flow] {
                    assert!(v <= 100);
                }
            }
        }
    }
}
