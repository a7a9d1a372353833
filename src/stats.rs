//! Small numeric helpers shared by the estimators

/// Clamp to `[0, 1]`, mapping NaN to 0
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Round to a fixed number of decimals
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Exponentially weighted moving average step: `prior*(1-alpha) + sample*alpha`
pub fn ewma(prior: f64, sample: f64, alpha: f64) -> f64 {
    prior * (1.0 - alpha) + sample * alpha
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Scale a `[0, 1]` score to an integer percentage
pub fn to_percent(x: f64) -> u8 {
    (clamp01(x) * 100.0).round() as u8
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(sum / values.len() as f64)
}

/// Population standard deviation, `None` for an empty slice
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_std() {
        // Classic example: mean 5, population std 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std(&values).unwrap() - 2.0).abs() < 1e-9);
        assert!(population_std(&[]).is_none());
    }

    #[test]
    fn test_ewma_step() {
        assert!((ewma(10.0, 20.0, 0.3) - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-0.0456, 3), -0.046);
    }

    #[test]
    fn test_clamp01_nan() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(3.0), 1.0);
        assert_eq!(to_percent(0.555), 56);
    }
}
