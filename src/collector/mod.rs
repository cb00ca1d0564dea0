//! Sample collection for the activity agent.
//!
//! A collector is the sensor source: the session registers interest with
//! [`SampleSource::start`] and unregisters with [`SampleSource::stop`].
//! Readings arrive on a bounded channel.

pub mod manual;
pub mod replay;
pub mod synthetic;
pub mod types;

use crossbeam_channel::Receiver;

// Re-export commonly used types
pub use manual::ManualCollector;
pub use replay::{parse_recording, ReplayCollector};
pub use synthetic::SyntheticCollector;
pub use types::{AccelSample, SyntheticPattern, AXES};

/// A source of accelerometer readings that can be registered and unregistered.
pub trait SampleSource {
    /// Register interest in the sample stream.
    fn start(&mut self) -> Result<(), CollectorError>;

    /// Unregister from the sample stream. Calling this while stopped is a no-op.
    fn stop(&mut self);

    /// Check if the source is currently registered.
    fn is_running(&self) -> bool;

    /// Receiver on which readings are delivered.
    fn receiver(&self) -> &Receiver<AccelSample>;

    /// Whether the source has no more readings to deliver, ever.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Settings shared by all collectors.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Readings per second (0 means as fast as possible for replays)
    pub rate_hz: u32,
    /// Capacity of the delivery channel
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            rate_hz: 50,
            channel_capacity: 10_000,
        }
    }
}

impl CollectorConfig {
    /// Delay between two emitted readings, or `None` when unthrottled.
    pub fn sample_period(&self) -> Option<std::time::Duration> {
        if self.rate_hz == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs_f64(1.0 / self.rate_hz as f64))
        }
    }
}

/// Errors that can occur during sample collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    IoError(String),
    ParseError { line: usize, message: String },
    EmptyRecording,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::IoError(e) => write!(f, "IO error: {e}"),
            CollectorError::ParseError { line, message } => {
                write!(f, "Parse error on line {line}: {message}")
            }
            CollectorError::EmptyRecording => write!(f, "Recording contains no samples"),
        }
    }
}

impl std::error::Error for CollectorError {}
