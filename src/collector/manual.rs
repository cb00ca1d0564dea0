//! Host-driven collector.
//!
//! Readings are pushed in by the embedding code (a platform sensor callback,
//! a test, a bridge). Pushes are only delivered while the collector is
//! registered, mirroring a platform listener that was unregistered.

use crate::collector::types::AccelSample;
use crate::collector::{CollectorConfig, CollectorError, SampleSource};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A collector fed by the host.
pub struct ManualCollector {
    sender: Sender<AccelSample>,
    receiver: Receiver<AccelSample>,
    running: Arc<AtomicBool>,
}

impl ManualCollector {
    /// Create a new manual collector.
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver a reading.
    ///
    /// Returns `false` when the collector is not registered or the channel is full.
    pub fn push(&self, sample: AccelSample) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.sender.try_send(sample).is_ok()
    }

    /// Handle that pushes readings from another thread.
    pub fn handle(&self) -> ManualHandle {
        ManualHandle {
            sender: self.sender.clone(),
            running: self.running.clone(),
        }
    }
}

impl Default for ManualCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

impl SampleSource for ManualCollector {
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<AccelSample> {
        &self.receiver
    }
}

/// Cloneable pushing side of a [`ManualCollector`].
#[derive(Clone)]
pub struct ManualHandle {
    sender: Sender<AccelSample>,
    running: Arc<AtomicBool>,
}

impl ManualHandle {
    /// Deliver a reading; see [`ManualCollector::push`].
    pub fn push(&self, sample: AccelSample) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.sender.try_send(sample).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_requires_registration() {
        let mut collector = ManualCollector::default();
        assert!(!collector.push(AccelSample::new(1.0, 2.0, 3.0)));

        collector.start().unwrap();
        assert!(collector.push(AccelSample::new(1.0, 2.0, 3.0)));
        assert_eq!(collector.receiver().len(), 1);

        collector.stop();
        assert!(!collector.handle().push(AccelSample::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut collector = ManualCollector::default();
        collector.start().unwrap();
        assert!(matches!(
            collector.start(),
            Err(CollectorError::AlreadyRunning)
        ));
    }
}
