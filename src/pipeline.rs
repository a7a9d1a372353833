//! Pipeline orchestration
//!
//! This module provides the per-session processor that ties the stages together:
//! ingestion → buffer → baseline and breathing estimation → stress/energy →
//! extended metrics → emotional indices.
//!
//! The processor is driven by an external scheduler calling [`VitalsProcessor::tick`]
//! every couple of seconds. It is single-owner; share it across threads through
//! [`SharedVitalsProcessor`].

use crate::baseline::BaselineTracker;
use crate::breathing::BreathingEstimator;
use crate::buffer::HeartRateBuffer;
use crate::config::PipelineConfig;
use crate::emotion::{calculate_emotional_indices, EmotionInputs};
use crate::error::ComputeError;
use crate::features::{window_std_dev, FeatureDeriver};
use crate::ingest::{DeviceEvent, SampleValidator};
use crate::stress;
use crate::types::{BaselineSnapshot, VitalsSnapshot};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

/// Handle returned by [`VitalsProcessor::subscribe`]
pub type ObserverId = u64;

/// Processor shared between a device thread and a scheduler thread
pub type SharedVitalsProcessor = Arc<Mutex<VitalsProcessor>>;

/// Receives every recomputed vitals snapshot
pub trait VitalsObserver {
    /// Handle a snapshot. Returning `false` unsubscribes the observer.
    fn on_vitals(&mut self, snapshot: &VitalsSnapshot) -> bool;
}

impl VitalsObserver for Sender<VitalsSnapshot> {
    fn on_vitals(&mut self, snapshot: &VitalsSnapshot) -> bool {
        self.send(snapshot.clone()).is_ok()
    }
}

/// Stateful processor for one device connection.
pub struct VitalsProcessor {
    config: PipelineConfig,
    validator: SampleValidator,
    buffer: HeartRateBuffer,
    baseline: BaselineTracker,
    breathing: BreathingEstimator,
    features: FeatureDeriver,
    /// Latest motion magnitude
    activity: f64,
    vitals: VitalsSnapshot,
    observers: Vec<(ObserverId, Box<dyn VitalsObserver + Send>)>,
    next_observer_id: ObserverId,
}

impl Default for VitalsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl VitalsProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::build(PipelineConfig::default())
    }

    /// Create a processor from a validated configuration
    pub fn with_config(config: PipelineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PipelineConfig) -> Self {
        Self {
            validator: SampleValidator::from_config(&config),
            buffer: HeartRateBuffer::new(config.retention_secs, config.max_samples),
            baseline: BaselineTracker::new(config.baseline_warmup_samples),
            breathing: BreathingEstimator::new(config.analysis_window_secs),
            features: FeatureDeriver::new(),
            activity: 0.0,
            vitals: VitalsSnapshot::default(),
            observers: Vec::new(),
            next_observer_id: 0,
            config,
        }
    }

    /// Accept a heart-rate notification from the device
    pub fn push_heart_rate(&mut self, t: f64, bpm: f64) -> Result<(), ComputeError> {
        if let Err(e) = self.validator.check_heart_rate(t, bpm) {
            tracing::warn!(t, bpm, error = %e, "rejected heart-rate sample");
            return Err(e);
        }
        self.buffer.append(t, bpm);
        Ok(())
    }

    /// Update the latest motion magnitude, read at instant `t`
    pub fn push_motion(&mut self, t: f64, magnitude: f64) -> Result<(), ComputeError> {
        if let Err(e) = self.validator.check_motion(t, magnitude) {
            tracing::warn!(t, magnitude, error = %e, "rejected motion reading");
            return Err(e);
        }
        self.activity = magnitude;
        Ok(())
    }

    /// Route a device event to the matching push
    pub fn push_event(&mut self, event: &DeviceEvent) -> Result<(), ComputeError> {
        match *event {
            DeviceEvent::HeartRate { t, bpm } => self.push_heart_rate(t, bpm),
            DeviceEvent::Motion { t, magnitude } => self.push_motion(t, magnitude),
        }
    }

    /// Whether `push_event` would accept this event, without ingesting it
    pub fn check_event(&self, event: &DeviceEvent) -> Result<(), ComputeError> {
        self.validator.validate(event)
    }

    /// Recompute the vitals snapshot at instant `now`.
    ///
    /// Returns `false` when too few samples are buffered; the previous
    /// snapshot is then left untouched and observers are not notified.
    pub fn tick(&mut self, now: f64) -> bool {
        let latest = match self.buffer.latest() {
            Some(latest) if self.buffer.len() >= self.config.min_samples => *latest,
            _ => {
                tracing::debug!(
                    buffered = self.buffer.len(),
                    required = self.config.min_samples,
                    "skipping tick, not enough samples"
                );
                return false;
            }
        };

        self.baseline.update(latest.hr, self.activity);

        let window = self
            .buffer
            .since(now - self.config.analysis_window_secs as f64);

        let estimate = self.breathing.estimate(&window, now);
        if let Some(br) = estimate.rate_bpm {
            self.baseline.update_breathing(br);
            self.vitals.br = Some(br);
        }

        let baseline = self.baseline.snapshot();
        let scores = stress::estimate(latest.hr, self.activity, &baseline, estimate.peak_power);

        self.vitals.t = Some(now);
        self.vitals.hr = Some(latest.hr);
        self.vitals.stress = Some(scores.stress);
        self.vitals.energy = Some(scores.energy);

        let metrics = self.features.derive(&window);
        self.vitals.apply_metrics(&metrics);

        if let Some(br) = self.vitals.br {
            let hr_values: Vec<f64> = window.iter().map(|s| s.hr).collect();
            let (br_mean_win, br_std_win) = self.breathing.window_stats().unwrap_or((br, 0.0));

            let indices = calculate_emotional_indices(&EmotionInputs {
                hr: latest.hr,
                br,
                hr0: baseline.hr_mean,
                hr_std: baseline.hr_deviation,
                br0: baseline.br_mean,
                br_std: baseline.br_deviation,
                hr_std_win: window_std_dev(&hr_values).unwrap_or(0.0),
                br_mean_win,
                br_std_win,
                dhr_dt: self.features.dhr_dt(),
                energy01: scores.energy01(),
                stress01: scores.stress01(),
            });
            self.vitals.apply_emotions(&indices);
        }

        let vitals = &self.vitals;
        self.observers.retain_mut(|(id, observer)| {
            let keep = observer.on_vitals(vitals);
            if !keep {
                tracing::debug!(observer = *id, "dropping disconnected observer");
            }
            keep
        });

        true
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> &VitalsSnapshot {
        &self.vitals
    }

    pub fn baseline(&self) -> BaselineSnapshot {
        self.baseline.snapshot()
    }

    pub fn buffer(&self) -> &HeartRateBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Register an observer notified after every recomputation
    pub fn subscribe(&mut self, observer: Box<dyn VitalsObserver + Send>) -> ObserverId {
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Drop all session state, as on device disconnect. Observers stay subscribed.
    pub fn reset(&mut self) {
        self.validator.reset();
        self.buffer.clear();
        self.baseline.reset();
        self.breathing.reset();
        self.features.reset();
        self.activity = 0.0;
        self.vitals = VitalsSnapshot::default();
    }

    /// Wrap into a mutex-guarded shared handle
    pub fn into_shared(self) -> SharedVitalsProcessor {
        Arc::new(Mutex::new(self))
    }
}

/// Fixed-interval tick instants derived from the event clock.
///
/// Used by replay drivers and game-loop style schedulers that only see
/// timestamps, not wall-clock timers.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    interval: f64,
    next: Option<f64>,
}

impl TickSchedule {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    /// Anchor the schedule: the first tick falls one interval after `t`
    pub fn start(&mut self, t: f64) {
        if self.next.is_none() {
            self.next = Some(t + self.interval);
        }
    }

    /// Pop the next tick instant strictly before `t`
    pub fn pop_before(&mut self, t: f64) -> Option<f64> {
        self.pop_if(|due| due < t)
    }

    /// Pop the next tick instant at or before `t`
    pub fn pop_through(&mut self, t: f64) -> Option<f64> {
        self.pop_if(|due| due <= t)
    }

    fn pop_if(&mut self, ready: impl Fn(f64) -> bool) -> Option<f64> {
        let due = self.next?;
        if !ready(due) {
            return None;
        }
        self.next = Some(due + self.interval);
        Some(due)
    }
}

/// Replays a timestamped event stream through a processor with simulated ticks.
///
/// The tick clock follows accepted heart-rate samples only; motion readings
/// never move it past the newest heart-rate timestamp.
pub struct Replayer {
    processor: VitalsProcessor,
    schedule: TickSchedule,
    last_hr_t: Option<f64>,
}

impl Replayer {
    pub fn new(processor: VitalsProcessor) -> Self {
        let schedule = TickSchedule::new(processor.config().tick_interval_secs);
        Self {
            processor,
            schedule,
            last_hr_t: None,
        }
    }

    /// Run the ticks that fall before this event, then ingest it.
    ///
    /// Returns the snapshots recomputed by those ticks. A rejected event runs
    /// no ticks and is reported as an error.
    pub fn feed(
        &mut self,
        event: &DeviceEvent,
    ) -> (Vec<VitalsSnapshot>, Result<(), ComputeError>) {
        let mut emitted = Vec::new();
        if self.processor.check_event(event).is_err() {
            // push_event logs and returns the same rejection
            return (emitted, self.processor.push_event(event));
        }

        match *event {
            DeviceEvent::HeartRate { t, .. } => {
                self.schedule.start(t);
                self.run_ticks(t, false, &mut emitted);
                self.last_hr_t = Some(t);
            }
            DeviceEvent::Motion { t, .. } => {
                if let Some(last_hr_t) = self.last_hr_t {
                    if t > last_hr_t {
                        self.run_ticks(last_hr_t, true, &mut emitted);
                    } else {
                        self.run_ticks(t, false, &mut emitted);
                    }
                }
            }
        }

        (emitted, self.processor.push_event(event))
    }

    /// Run the ticks due up to the last accepted heart-rate sample
    pub fn finish(&mut self) -> Vec<VitalsSnapshot> {
        let mut emitted = Vec::new();
        if let Some(last_hr_t) = self.last_hr_t {
            self.run_ticks(last_hr_t, true, &mut emitted);
        }
        emitted
    }

    pub fn processor(&self) -> &VitalsProcessor {
        &self.processor
    }

    fn run_ticks(&mut self, limit: f64, inclusive: bool, emitted: &mut Vec<VitalsSnapshot>) {
        loop {
            let due = if inclusive {
                self.schedule.pop_through(limit)
            } else {
                self.schedule.pop_before(limit)
            };
            let Some(due) = due else { break };
            if self.processor.tick(due) {
                emitted.push(self.processor.snapshot().clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtendedMetrics;
    use std::f64::consts::PI;
    use std::sync::mpsc;

    fn breathing_hr(t: f64) -> f64 {
        70.0 + 4.0 * (2.0 * PI * 0.25 * t).sin()
    }

    fn run_session(processor: &mut VitalsProcessor, seconds: usize) {
        for i in 0..=seconds {
            let t = i as f64;
            processor.push_heart_rate(t, breathing_hr(t)).unwrap();
            if i % 2 == 0 {
                processor.tick(t);
            }
        }
    }

    #[test]
    fn test_tick_skipped_until_enough_samples() {
        let mut processor = VitalsProcessor::new();
        for i in 0..9 {
            processor.push_heart_rate(i as f64, 70.0).unwrap();
        }
        assert!(!processor.tick(9.0));
        assert_eq!(processor.snapshot(), &VitalsSnapshot::default());
        assert_eq!(processor.baseline().sample_count, 0);

        processor.push_heart_rate(9.0, 70.0).unwrap();
        assert!(processor.tick(10.0));
        assert_eq!(processor.snapshot().hr, Some(70.0));
    }

    #[test]
    fn test_full_session_produces_bounded_vitals() {
        let mut processor = VitalsProcessor::new();
        run_session(&mut processor, 120);

        let vitals = processor.snapshot();
        let br = vitals.br.unwrap();
        assert!((6.0..=30.0).contains(&br));
        assert!((br - 15.0).abs() <= 1.2 + 1e-9, "br {br}");

        assert!(vitals.stress.unwrap() <= 100);
        assert!(vitals.energy.unwrap() <= 100);
        assert!(vitals.hrv.unwrap() > 0.0);
        assert!(vitals.csi.unwrap() <= 1.0);
        assert!(vitals.recovery_rate.is_some());
        assert!(vitals.hr_trend_slope.is_some());
        assert!(vitals.hr_acceleration.is_some());

        let indices = vitals.emotional_indices().unwrap();
        for v in [
            indices.arousal,
            indices.calm,
            indices.focus,
            indices.excitement,
            indices.fatigue,
            indices.flow,
        ] {
            assert!(v <= 100);
        }
    }

    #[test]
    fn test_baseline_latches_after_warmup_ticks() {
        let mut processor = VitalsProcessor::new();
        // ticks at 0, 2, ..., 250; effective from t = 10 onward
        run_session(&mut processor, 250);
        let baseline = processor.baseline();
        assert!(baseline.ready);
        assert_eq!(baseline.sample_count, 121);
        assert!(baseline.br_mean > 0.0);
    }

    #[test]
    fn test_observers_receive_snapshots() {
        let mut processor = VitalsProcessor::new();
        let (tx, rx) = mpsc::channel();
        let id = processor.subscribe(Box::new(tx));

        run_session(&mut processor, 20);
        let received: Vec<VitalsSnapshot> = rx.try_iter().collect();
        // effective ticks at 10, 12, ..., 20
        assert_eq!(received.len(), 6);
        assert_eq!(received.last(), Some(processor.snapshot()));

        assert!(processor.unsubscribe(id));
        assert!(!processor.unsubscribe(id));
        processor.push_heart_rate(21.0, 70.0).unwrap();
        processor.tick(22.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_invalid_sample_is_rejected() {
        let mut processor = VitalsProcessor::new();
        processor.push_heart_rate(5.0, 70.0).unwrap();
        assert!(processor.push_heart_rate(6.0, -3.0).is_err());
        assert!(processor.push_heart_rate(4.0, 70.0).is_err());
        assert!(processor.push_motion(5.0, f64::INFINITY).is_err());
        assert_eq!(processor.buffer().len(), 1);
    }

    #[test]
    fn test_reset_on_disconnect() {
        let mut processor = VitalsProcessor::new();
        run_session(&mut processor, 60);
        assert!(processor.snapshot().stress.is_some());

        processor.reset();
        assert!(processor.buffer().is_empty());
        assert_eq!(processor.snapshot(), &VitalsSnapshot::default());
        assert_eq!(processor.baseline(), BaselineSnapshot::default());

        // Timestamps may restart after a reconnect
        assert!(processor.push_heart_rate(0.0, 70.0).is_ok());
    }

    #[test]
    fn test_missing_metrics_keep_previous_values() {
        let mut vitals = VitalsSnapshot {
            hrv: Some(4.2),
            hr_acceleration: Some(0.5),
            ..Default::default()
        };
        vitals.apply_metrics(&ExtendedMetrics {
            hrv: Some(3.1),
            ..Default::default()
        });
        assert_eq!(vitals.hrv, Some(3.1));
        assert_eq!(vitals.hr_acceleration, Some(0.5));
    }

    #[test]
    fn test_motion_raises_stress() {
        let mut still = VitalsProcessor::new();
        run_session(&mut still, 60);

        let mut moving = VitalsProcessor::new();
        run_session(&mut moving, 60);
        moving.push_motion(60.0, 5.0).unwrap();
        moving.push_heart_rate(61.0, breathing_hr(61.0)).unwrap();
        still.push_heart_rate(61.0, breathing_hr(61.0)).unwrap();
        moving.tick(62.0);
        still.tick(62.0);

        assert!(moving.snapshot().stress > still.snapshot().stress);
    }

    #[test]
    fn test_tick_schedule() {
        let mut schedule = TickSchedule::new(2.0);
        assert_eq!(schedule.pop_before(100.0), None);

        schedule.start(0.0);
        schedule.start(50.0);
        assert_eq!(schedule.pop_before(2.0), None);
        assert_eq!(schedule.pop_through(2.0), Some(2.0));
        assert_eq!(schedule.pop_before(7.0), Some(4.0));
        assert_eq!(schedule.pop_before(7.0), Some(6.0));
        assert_eq!(schedule.pop_before(7.0), None);
    }

    #[test]
    fn test_replayer_emits_effective_ticks() {
        let mut replayer = Replayer::new(VitalsProcessor::new());
        let mut snapshots = Vec::new();

        for i in 0..=30 {
            let event = DeviceEvent::HeartRate {
                t: i as f64,
                bpm: breathing_hr(i as f64),
            };
            let (emitted, result) = replayer.feed(&event);
            result.unwrap();
            snapshots.extend(emitted);
        }
        snapshots.extend(replayer.finish());

        // tick at T sees samples 0..=T, so T >= 9 is effective: 10, 12, ..., 30
        let ticks: Vec<f64> = snapshots.iter().filter_map(|s| s.t).collect();
        assert_eq!(ticks, (5..=15).map(|k| k as f64 * 2.0).collect::<Vec<_>>());
    }

    fn feed_heart_rate(
        replayer: &mut Replayer,
        range: std::ops::RangeInclusive<u32>,
    ) -> Vec<VitalsSnapshot> {
        let mut snapshots = Vec::new();
        for i in range {
            let t = f64::from(i);
            let (emitted, result) = replayer.feed(&DeviceEvent::HeartRate {
                t,
                bpm: breathing_hr(t),
            });
            result.unwrap();
            snapshots.extend(emitted);
        }
        snapshots
    }

    #[test]
    fn test_far_future_motion_does_not_move_the_clock() {
        let mut replayer = Replayer::new(VitalsProcessor::new());
        let mut snapshots = feed_heart_rate(&mut replayer, 0..=19);

        let (emitted, result) = replayer.feed(&DeviceEvent::Motion {
            t: 20_000.0,
            magnitude: 0.1,
        });
        assert!(emitted.is_empty());
        assert!(matches!(result, Err(ComputeError::InvalidMotion(_))));

        snapshots.extend(feed_heart_rate(&mut replayer, 20..=199));
        snapshots.extend(replayer.finish());

        // effective ticks 10, 12, ..., 198
        let ticks: Vec<f64> = snapshots.iter().filter_map(|s| s.t).collect();
        assert_eq!(ticks, (5..=99).map(|k| k as f64 * 2.0).collect::<Vec<_>>());
    }

    #[test]
    fn test_motion_ahead_of_heart_rate_waits_for_it() {
        let mut replayer = Replayer::new(VitalsProcessor::new());
        feed_heart_rate(&mut replayer, 0..=19);

        let (emitted, result) = replayer.feed(&DeviceEvent::Motion {
            t: 22.0,
            magnitude: 0.3,
        });
        result.unwrap();
        assert!(emitted.is_empty());
        assert_eq!(replayer.processor().snapshot().t, Some(18.0));

        assert!(feed_heart_rate(&mut replayer, 20..=20).is_empty());
        let next = feed_heart_rate(&mut replayer, 21..=21);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].t, Some(20.0));
    }

    #[test]
    fn test_disconnected_observer_is_dropped() {
        let mut processor = VitalsProcessor::new();
        let (tx, rx) = mpsc::channel();
        let id = processor.subscribe(Box::new(tx));
        drop(rx);

        run_session(&mut processor, 10);
        assert!(!processor.unsubscribe(id));
    }

    #[test]
    fn test_shared_processor_across_threads() {
        let shared = VitalsProcessor::new().into_shared();
        let writer = Arc::clone(&shared);

        let handle = std::thread::spawn(move || {
            for i in 0..20 {
                let mut p = writer.lock().unwrap();
                p.push_heart_rate(i as f64, 72.0).unwrap();
            }
        });
        handle.join().unwrap();

        let mut p = shared.lock().unwrap();
        assert!(p.tick(20.0));
        assert_eq!(p.snapshot().hr, Some(72.0));
    }
}
