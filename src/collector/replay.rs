//! Replay of recorded accelerometer data.
//!
//! Recordings are plain text, one reading per line as `x,y,z`. A leading
//! timestamp column (`t,x,y,z`) is accepted and ignored. Blank lines and
//! lines starting with `#` are skipped, as is a non-numeric header line.

use crate::collector::types::{AccelSample, AXES};
use crate::collector::{CollectorConfig, CollectorError, SampleSource};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Parse a recording into axis triples.
pub fn parse_recording(content: &str) -> Result<Vec<[f32; AXES]>, CollectorError> {
    let mut readings = Vec::new();
    let mut seen_data = false;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let values: Result<Vec<f32>, _> = fields.iter().map(|f| f.parse::<f32>()).collect();

        let values = match values {
            Ok(values) => values,
            // First non-comment line may be a column header
            Err(_) if !seen_data && fields.iter().any(|f| f.parse::<f32>().is_err()) => {
                seen_data = true;
                continue;
            }
            Err(e) => {
                return Err(CollectorError::ParseError {
                    line: line_no,
                    message: e.to_string(),
                })
            }
        };
        seen_data = true;

        let axes = match values.len() {
            3 => [values[0], values[1], values[2]],
            4 => [values[1], values[2], values[3]],
            n => {
                return Err(CollectorError::ParseError {
                    line: line_no,
                    message: format!("expected 3 or 4 columns, found {n}"),
                })
            }
        };
        readings.push(axes);
    }

    Ok(readings)
}

/// Send, waiting for room in the channel until the collector is unregistered.
fn send_blocking(sender: &Sender<AccelSample>, sample: AccelSample, running: &AtomicBool) -> bool {
    let mut pending = sample;
    loop {
        match sender.send_timeout(pending, Duration::from_millis(50)) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(sample)) => {
                if !running.load(Ordering::SeqCst) {
                    return false;
                }
                pending = sample;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// A collector that replays a recording on a background thread.
pub struct ReplayCollector {
    readings: Arc<Vec<[f32; AXES]>>,
    config: CollectorConfig,
    loop_replay: bool,
    sender: Sender<AccelSample>,
    receiver: Receiver<AccelSample>,
    running: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
    /// Replay position, kept across stop/start
    position: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl ReplayCollector {
    /// Create a collector from already-parsed readings.
    pub fn new(
        readings: Vec<[f32; AXES]>,
        config: CollectorConfig,
        loop_replay: bool,
    ) -> Result<Self, CollectorError> {
        if readings.is_empty() {
            return Err(CollectorError::EmptyRecording);
        }
        let (sender, receiver) = bounded(config.channel_capacity);
        Ok(Self {
            readings: Arc::new(readings),
            config,
            loop_replay,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            exhausted: Arc::new(AtomicBool::new(false)),
            position: Arc::new(AtomicUsize::new(0)),
            worker: None,
        })
    }

    /// Load and parse a recording file.
    pub fn from_path(
        path: &Path,
        config: CollectorConfig,
        loop_replay: bool,
    ) -> Result<Self, CollectorError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CollectorError::IoError(e.to_string()))?;
        let readings = parse_recording(&content)?;
        tracing::info!(
            path = %path.display(),
            readings = readings.len(),
            "Loaded recording"
        );
        Self::new(readings, config, loop_replay)
    }

    /// Number of readings in the recording.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// A replay collector is never empty; see [`ReplayCollector::new`].
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Replay thread panicked");
            }
        }
    }
}

impl SampleSource for ReplayCollector {
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        // A finished replay thread may still be parked in `worker`
        self.join_worker();
        if self.exhausted.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let readings = self.readings.clone();
        let running = self.running.clone();
        let exhausted = self.exhausted.clone();
        let position = self.position.clone();
        let sender = self.sender.clone();
        let loop_replay = self.loop_replay;
        let period = self.config.sample_period();

        self.worker = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let mut pos = position.load(Ordering::SeqCst);
                if pos >= readings.len() {
                    if loop_replay {
                        pos = 0;
                    } else {
                        exhausted.store(true, Ordering::SeqCst);
                        running.store(false, Ordering::SeqCst);
                        tracing::info!("Recording finished");
                        break;
                    }
                }

                let [x, y, z] = readings[pos];
                let sample = AccelSample::new(x, y, z);
                // Unthrottled replays block rather than drop readings
                let delivered = match period {
                    Some(_) => sender.try_send(sample).is_ok(),
                    None => send_blocking(&sender, sample, &running),
                };
                if !delivered {
                    if period.is_none() {
                        // Unregistered mid-send; resume from this reading
                        break;
                    }
                    tracing::trace!("Replay sample dropped");
                }
                position.store(pos + 1, Ordering::SeqCst);

                if let Some(period) = period {
                    thread::sleep(period);
                }
            }
        }));

        Ok(())
    }

    /// Unregister. Readings sent but not yet received are taken back out of
    /// the channel and the position rewound, so the next registration
    /// replays them instead of losing them.
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join_worker();

        let unread = self.receiver.try_iter().count();
        let len = self.readings.len();
        let position = self.position.load(Ordering::SeqCst);
        if unread > 0 {
            let rewound = if self.loop_replay {
                (position + len - unread % len) % len
            } else {
                position.saturating_sub(unread)
            };
            self.position.store(rewound, Ordering::SeqCst);
            self.exhausted.store(false, Ordering::SeqCst);
            tracing::debug!(unread, position = rewound, "Replay rewound to first unread reading");
        } else if !self.loop_replay && position >= len {
            self.exhausted.store(true, Ordering::SeqCst);
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<AccelSample> {
        &self.receiver
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

impl Drop for ReplayCollector {
    fn drop(&mut self) {
        self.stop();
    }
}
