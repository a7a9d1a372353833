//! Heart-rate time series buffer
//!
//! Holds the most recent samples in time order. Eviction is lazy: every append
//! drops samples from the front that fell out of the retention window, plus
//! anything beyond the hard sample cap.

use crate::config::{DEFAULT_MAX_SAMPLES, DEFAULT_RETENTION_SECS};
use crate::types::Sample;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct HeartRateBuffer {
    samples: VecDeque<Sample>,
    retention_secs: f64,
    max_samples: usize,
}

impl Default for HeartRateBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_SECS, DEFAULT_MAX_SAMPLES)
    }
}

impl HeartRateBuffer {
    pub fn new(retention_secs: f64, max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            retention_secs,
            max_samples: max_samples.max(1),
        }
    }

    /// Append a sample. The caller guarantees `t` does not go backwards.
    pub fn append(&mut self, t: f64, hr: f64) {
        self.samples.push_back(Sample { t, hr });

        let cutoff = t - self.retention_secs;
        while self.samples.front().is_some_and(|s| s.t < cutoff) {
            self.samples.pop_front();
        }

        if self.samples.len() > self.max_samples {
            let overflow = self.samples.len() - self.max_samples;
            tracing::warn!(
                overflow,
                max_samples = self.max_samples,
                "heart-rate buffer over capacity, dropping oldest samples"
            );
            self.samples.drain(..overflow);
        }
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    /// Samples with `t >= since`, oldest first
    pub fn since(&self, since: f64) -> Vec<Sample> {
        // Time-ordered, so scan back from the newest end
        let start = self
            .samples
            .iter()
            .rposition(|s| s.t < since)
            .map_or(0, |i| i + 1);
        self.samples.range(start..).copied().collect()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
