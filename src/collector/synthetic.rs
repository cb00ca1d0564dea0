//! Synthetic accelerometer collector.
//!
//! Emits a deterministic waveform for a chosen activity pattern so the whole
//! pipeline can run on machines without a motion sensor.

use crate::collector::types::{AccelSample, SyntheticPattern, AXES};
use crate::collector::{CollectorConfig, CollectorError, SampleSource};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Standard gravity in m/s², carried on the z axis.
pub const GRAVITY: f32 = 9.81;

/// Time base used when the collector runs unthrottled.
const FALLBACK_RATE_HZ: f32 = 50.0;

/// Compute the reading for sample `index` of a pattern at `rate_hz`.
pub fn synthetic_reading(pattern: SyntheticPattern, index: u64, rate_hz: u32) -> [f32; AXES] {
    let rate = if rate_hz == 0 {
        FALLBACK_RATE_HZ
    } else {
        rate_hz as f32
    };
    let t = index as f32 / rate;
    let wave = |amplitude: f32, freq_hz: f32| amplitude * (2.0 * PI * freq_hz * t).sin();

    match pattern {
        SyntheticPattern::Still => [
            wave(0.02, 1.0),
            0.02 * (2.0 * PI * t).cos(),
            GRAVITY + wave(0.01, 3.0),
        ],
        SyntheticPattern::Walking => [wave(0.8, 2.0), wave(0.3, 1.0), GRAVITY + wave(1.5, 2.0)],
        SyntheticPattern::Running => [wave(3.0, 3.0), wave(1.0, 1.5), GRAVITY + wave(6.0, 3.0)],
        // Slow, mostly vertical reps
        SyntheticPattern::Weightlifting => {
            [wave(0.05, 1.0), wave(0.05, 1.0), GRAVITY + wave(3.0, 0.5)]
        }
    }
}

/// A collector producing a synthetic waveform on a background thread.
pub struct SyntheticCollector {
    pattern: SyntheticPattern,
    config: CollectorConfig,
    sender: Sender<AccelSample>,
    receiver: Receiver<AccelSample>,
    running: Arc<AtomicBool>,
    /// Next sample index, kept across stop/start so the waveform continues
    next_index: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticCollector {
    /// Create a new synthetic collector for the given pattern.
    pub fn new(pattern: SyntheticPattern, config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity);
        Self {
            pattern,
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            next_index: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    /// The pattern being generated.
    pub fn pattern(&self) -> SyntheticPattern {
        self.pattern
    }
}

impl SampleSource for SyntheticCollector {
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let next_index = self.next_index.clone();
        let sender = self.sender.clone();
        let pattern = self.pattern;
        let rate_hz = self.config.rate_hz;
        let period = self.config.sample_period();

        self.worker = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let index = next_index.fetch_add(1, Ordering::SeqCst);
                let [x, y, z] = synthetic_reading(pattern, index, rate_hz);
                if sender.try_send(AccelSample::new(x, y, z)).is_err() {
                    tracing::trace!("Synthetic sample dropped, channel full");
                }
                if let Some(period) = period {
                    thread::sleep(period);
                }
            }
        }));

        tracing::debug!(pattern = %self.pattern, "Synthetic collector registered");
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Synthetic collector thread panicked");
            }
            tracing::debug!("Synthetic collector unregistered");
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<AccelSample> {
        &self.receiver
    }
}

impl Drop for SyntheticCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_still_pattern_is_near_gravity() {
        for index in 0..100 {
            let [x, y, z] = synthetic_reading(SyntheticPattern::Still, index, 50);
            assert!(x.abs() <= 0.02 + 1e-6);
            assert!(y.abs() <= 0.02 + 1e-6);
            assert!((z - GRAVITY).abs() <= 0.01 + 1e-6);
        }
    }

    #[test]
    fn test_running_has_larger_swing_than_walking() {
        let peak = |pattern| {
            (0..50)
                .map(|i| (synthetic_reading(pattern, i, 50)[2] - GRAVITY).abs())
                .fold(0.0f32, f32::max)
        };
        assert!(peak(SyntheticPattern::Running) > peak(SyntheticPattern::Walking));
    }

    #[test]
    fn test_collector_emits_while_registered() {
        let config = CollectorConfig {
            rate_hz: 1000,
            channel_capacity: 64,
        };
        let mut collector = SyntheticCollector::new(SyntheticPattern::Walking, config);
        collector.start().unwrap();
        let sample = collector
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .expect("no sample emitted");
        assert!(sample.z > 0.0);

        collector.stop();
        assert!(!collector.is_running());
        while collector.receiver().try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(20));
        assert!(collector.receiver().try_recv().is_err());
    }
}
