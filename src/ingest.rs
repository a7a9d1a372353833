//! Device ingestion boundary
//!
//! Raw readings from the heart-rate strap and the phone's motion sensor are
//! checked here, before they reach the estimators. The math downstream assumes
//! plausible heart rates and non-decreasing timestamps and does not re-check.

use crate::config::PipelineConfig;
use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// One event pushed by the device collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// Heart-rate notification
    HeartRate { t: f64, bpm: f64 },
    /// Accelerometer RMS magnitude
    Motion { t: f64, magnitude: f64 },
}

impl DeviceEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            DeviceEvent::HeartRate { t, .. } | DeviceEvent::Motion { t, .. } => *t,
        }
    }
}

/// Validation failure for a single event in a batch
#[derive(Debug)]
pub struct EventValidation {
    pub index: usize,
    pub error: ComputeError,
}

/// Gatekeeper for heart-rate samples and motion readings.
///
/// Heart-rate and motion timestamps are each non-decreasing. Motion may run
/// ahead of the newest heart-rate sample by at most `max_motion_lead_secs`.
#[derive(Debug, Clone)]
pub struct SampleValidator {
    hr_min_bpm: f64,
    hr_max_bpm: f64,
    max_motion_lead_secs: f64,
    last_hr_t: Option<f64>,
    last_motion_t: Option<f64>,
}

impl Default for SampleValidator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl SampleValidator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            hr_min_bpm: config.hr_min_bpm,
            hr_max_bpm: config.hr_max_bpm,
            max_motion_lead_secs: config.max_motion_lead_secs,
            last_hr_t: None,
            last_motion_t: None,
        }
    }

    /// Check a heart-rate sample without recording it.
    ///
    /// Equal timestamps are accepted; going backwards is not.
    pub fn validate_heart_rate(&self, t: f64, bpm: f64) -> Result<(), ComputeError> {
        if !t.is_finite() {
            return Err(ComputeError::InvalidSample(format!(
                "timestamp must be finite, got {t}"
            )));
        }
        if !bpm.is_finite() || bpm < self.hr_min_bpm || bpm > self.hr_max_bpm {
            return Err(ComputeError::InvalidSample(format!(
                "heart rate {bpm} bpm outside [{}, {}]",
                self.hr_min_bpm, self.hr_max_bpm
            )));
        }
        if let Some(previous) = self.last_hr_t {
            if t < previous {
                return Err(ComputeError::NonMonotonicTimestamp { previous, got: t });
            }
        }
        Ok(())
    }

    /// Check a heart-rate sample and, if accepted, remember its timestamp
    pub fn check_heart_rate(&mut self, t: f64, bpm: f64) -> Result<(), ComputeError> {
        self.validate_heart_rate(t, bpm)?;
        self.last_hr_t = Some(t);
        Ok(())
    }

    /// Check a motion reading without recording it
    pub fn validate_motion(&self, t: f64, magnitude: f64) -> Result<(), ComputeError> {
        if !t.is_finite() {
            return Err(ComputeError::InvalidMotion(format!(
                "timestamp must be finite, got {t}"
            )));
        }
        if !magnitude.is_finite() || magnitude < 0.0 {
            return Err(ComputeError::InvalidMotion(format!(
                "magnitude must be a non-negative number, got {magnitude}"
            )));
        }
        if let Some(previous) = self.last_motion_t {
            if t < previous {
                return Err(ComputeError::NonMonotonicTimestamp { previous, got: t });
            }
        }
        if let Some(hr_t) = self.last_hr_t {
            if t > hr_t + self.max_motion_lead_secs {
                return Err(ComputeError::InvalidMotion(format!(
                    "timestamp {t}s is more than {}s ahead of the last heart-rate sample at {hr_t}s",
                    self.max_motion_lead_secs
                )));
            }
        }
        Ok(())
    }

    /// Check a motion reading and, if accepted, remember its timestamp
    pub fn check_motion(&mut self, t: f64, magnitude: f64) -> Result<(), ComputeError> {
        self.validate_motion(t, magnitude)?;
        self.last_motion_t = Some(t);
        Ok(())
    }

    /// Check any device event without recording it
    pub fn validate(&self, event: &DeviceEvent) -> Result<(), ComputeError> {
        match *event {
            DeviceEvent::HeartRate { t, bpm } => self.validate_heart_rate(t, bpm),
            DeviceEvent::Motion { t, magnitude } => self.validate_motion(t, magnitude),
        }
    }

    /// Check any device event and record it when accepted
    pub fn check(&mut self, event: &DeviceEvent) -> Result<(), ComputeError> {
        match *event {
            DeviceEvent::HeartRate { t, bpm } => self.check_heart_rate(t, bpm),
            DeviceEvent::Motion { t, magnitude } => self.check_motion(t, magnitude),
        }
    }

    /// Timestamp of the newest accepted heart-rate sample
    pub fn last_heart_rate_t(&self) -> Option<f64> {
        self.last_hr_t
    }

    pub fn reset(&mut self) {
        self.last_hr_t = None;
        self.last_motion_t = None;
    }
}

/// Parse newline-delimited device events, skipping blank lines
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<DeviceEvent>, ComputeError> {
    let mut events = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<DeviceEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => {
                return Err(ComputeError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(events)
}

/// Parse a JSON array of device events
pub fn parse_array(json: &str) -> Result<Vec<DeviceEvent>, ComputeError> {
    Ok(serde_json::from_str(json)?)
}

/// Run a batch through a fresh validator and collect every failure
pub fn validate_events(events: &[DeviceEvent], config: &PipelineConfig) -> Vec<EventValidation> {
    let mut validator = SampleValidator::from_config(config);
    events
        .iter()
        .enumerate()
        .filter_map(|(index, event)| {
            validator
                .check(event)
                .err()
                .map(|error| EventValidation { index, error })
        })
        .collect()
}
