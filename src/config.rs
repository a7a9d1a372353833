//! Pipeline configuration
//!
//! Defaults match the behavior the mobile app ships with. Overrides are meant
//! for replay tooling and tests rather than for tuning the scores.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Default retention of the heart-rate buffer in seconds
pub const DEFAULT_RETENTION_SECS: f64 = 180.0;

/// Default hard cap on buffered samples
pub const DEFAULT_MAX_SAMPLES: usize = 4096;

/// Default analysis window in seconds (also the resample length at 1 Hz)
pub const DEFAULT_ANALYSIS_WINDOW_SECS: usize = 45;

/// Default minimum buffered samples before a tick does any work
pub const DEFAULT_MIN_SAMPLES: usize = 10;

/// Default recomputation interval in seconds
pub const DEFAULT_TICK_INTERVAL_SECS: f64 = 2.0;

/// Default number of HR/activity updates before the baseline latches
pub const DEFAULT_BASELINE_WARMUP: u32 = 120;

/// Default limit on how far a motion reading may run ahead of the newest heart-rate sample
pub const DEFAULT_MAX_MOTION_LEAD_SECS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples older than `newest - retention_secs` are evicted
    pub retention_secs: f64,
    /// Hard cap on buffered samples, independent of retention
    pub max_samples: usize,
    /// Analysis window in seconds
    pub analysis_window_secs: usize,
    /// Ticks are skipped while fewer samples are buffered
    pub min_samples: usize,
    /// Seconds between recomputations
    pub tick_interval_secs: f64,
    /// Baseline latches ready once its update count exceeds this
    pub baseline_warmup_samples: u32,
    /// Lowest heart rate accepted at ingestion (bpm)
    pub hr_min_bpm: f64,
    /// Highest heart rate accepted at ingestion (bpm)
    pub hr_max_bpm: f64,
    /// Motion readings further ahead of the newest heart-rate sample are rejected (seconds)
    pub max_motion_lead_secs: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            max_samples: DEFAULT_MAX_SAMPLES,
            analysis_window_secs: DEFAULT_ANALYSIS_WINDOW_SECS,
            min_samples: DEFAULT_MIN_SAMPLES,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            baseline_warmup_samples: DEFAULT_BASELINE_WARMUP,
            hr_min_bpm: 20.0,
            hr_max_bpm: 250.0,
            max_motion_lead_secs: DEFAULT_MAX_MOTION_LEAD_SECS,
        }
    }
}

impl PipelineConfig {
    /// Check that the configuration is internally consistent
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.retention_secs.is_finite() && self.retention_secs > 0.0) {
            return Err(ComputeError::ConfigError(format!(
                "retention_secs must be positive, got {}",
                self.retention_secs
            )));
        }
        if self.max_samples == 0 {
            return Err(ComputeError::ConfigError(
                "max_samples must be at least 1".to_string(),
            ));
        }
        if self.analysis_window_secs < 3 {
            return Err(ComputeError::ConfigError(format!(
                "analysis_window_secs must be at least 3, got {}",
                self.analysis_window_secs
            )));
        }
        if (self.analysis_window_secs as f64) > self.retention_secs {
            return Err(ComputeError::ConfigError(
                "analysis window cannot exceed buffer retention".to_string(),
            ));
        }
        if !(self.tick_interval_secs.is_finite() && self.tick_interval_secs > 0.0) {
            return Err(ComputeError::ConfigError(format!(
                "tick_interval_secs must be positive, got {}",
                self.tick_interval_secs
            )));
        }
        if !(self.hr_min_bpm.is_finite()
            && self.hr_max_bpm.is_finite()
            && self.hr_min_bpm > 0.0
            && self.hr_min_bpm < self.hr_max_bpm)
        {
            return Err(ComputeError::ConfigError(format!(
                "invalid heart-rate range [{}, {}]",
                self.hr_min_bpm, self.hr_max_bpm
            )));
        }
        if !(self.max_motion_lead_secs.is_finite() && self.max_motion_lead_secs >= 0.0) {
            return Err(ComputeError::ConfigError(format!(
                "max_motion_lead_secs must be non-negative, got {}",
                self.max_motion_lead_secs
            )));
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = PipelineConfig::from_json(r#"{"max_samples": 512}"#).unwrap();
        assert_eq!(
            config,
            PipelineConfig {
                max_samples: 512,
                ..PipelineConfig::default()
            }
        );
    }

    #[test]
    fn test_rejects_window_longer_than_retention() {
        let result = PipelineConfig::from_json(r#"{"retention_secs": 30, "analysis_window_secs": 45}"#);
        assert!(matches!(result, Err(ComputeError::ConfigError(_))));
    }

    #[test]
    fn test_round_trip() {
        let config = PipelineConfig::default();
        let loaded = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, loaded);
    }
}
