//! Listening session: ties a sample source to the buffer and dispatcher.
//!
//! The session owns all mutable state (no process-wide statics). Readings
//! are written to the buffer only while the session is `Listening`. When a
//! window fills the source is optionally unregistered (`Suspended`) so no
//! reading lands while the window is classified; the duty cycle registers
//! it again every `sampling_interval`.

use crate::classifier::Classifier;
use crate::collector::{AccelSample, CollectorError, SampleSource};
use crate::core::buffer::{BufferError, SampleBuffer, DEFAULT_CAPACITY};
use crate::core::dispatch::{
    ClassificationOutcome, DispatchError, DispatchPolicy, Dispatcher, DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::stats::SharedStats;
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long the run loop waits for a reading before doing housekeeping.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Floats per window
    pub buffer_capacity: usize,
    pub policy: DispatchPolicy,
    /// Unregister the source while a full window is classified
    pub unregister_on_full: bool,
    /// Bound of the async dispatch queue
    pub max_pending: usize,
    /// Period of the re-registration duty cycle
    pub sampling_interval: Duration,
    /// How long `stop` waits for a running classification
    pub shutdown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            policy: DispatchPolicy::Async,
            unregister_on_full: true,
            max_pending: 1,
            sampling_interval: Duration::from_millis(5000),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, source not yet registered
    Idle,
    /// Source registered, readings accumulate
    Listening,
    /// Source unregistered until the next duty cycle
    Suspended,
    /// Terminal
    Stopped,
}

/// Session errors.
#[derive(Debug)]
pub enum SessionError {
    Buffer(BufferError),
    Collector(CollectorError),
    Dispatch(DispatchError),
    Stopped,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Buffer(e) => write!(f, "Buffer error: {e}"),
            SessionError::Collector(e) => write!(f, "Collector error: {e}"),
            SessionError::Dispatch(e) => write!(f, "Dispatch error: {e}"),
            SessionError::Stopped => write!(f, "Session has been stopped"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<BufferError> for SessionError {
    fn from(e: BufferError) -> Self {
        SessionError::Buffer(e)
    }
}

impl From<CollectorError> for SessionError {
    fn from(e: CollectorError) -> Self {
        SessionError::Collector(e)
    }
}

impl From<DispatchError> for SessionError {
    fn from(e: DispatchError) -> Self {
        SessionError::Dispatch(e)
    }
}

/// Accumulates readings from a source and dispatches full windows.
pub struct ListeningSession<S: SampleSource> {
    source: S,
    buffer: SampleBuffer,
    dispatcher: Dispatcher,
    classifier: Arc<dyn Classifier>,
    stats: SharedStats,
    config: SessionConfig,
    state: SessionState,
    latest: Option<AccelSample>,
    last_registration: Option<Instant>,
}

impl<S: SampleSource> ListeningSession<S> {
    /// Create a session. The source is not registered until [`ListeningSession::start`].
    pub fn new(
        source: S,
        classifier: Arc<dyn Classifier>,
        config: SessionConfig,
        stats: SharedStats,
    ) -> Result<Self, SessionError> {
        let buffer = SampleBuffer::with_capacity(config.buffer_capacity)?;
        let dispatcher = Dispatcher::new(
            config.policy,
            classifier.clone(),
            stats.clone(),
            config.max_pending,
        )
        .with_shutdown_timeout(config.shutdown_timeout);

        Ok(Self {
            source,
            buffer,
            dispatcher,
            classifier,
            stats,
            config,
            state: SessionState::Idle,
            latest: None,
            last_registration: None,
        })
    }

    /// Register the source and begin accumulating.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Stopped => Err(SessionError::Stopped),
            SessionState::Listening => Ok(()),
            SessionState::Idle | SessionState::Suspended => self.register(),
        }
    }

    fn register(&mut self) -> Result<(), SessionError> {
        if !self.source.is_running() {
            self.source.start()?;
        }
        self.state = SessionState::Listening;
        self.last_registration = Some(Instant::now());
        tracing::debug!("Sample source registered");
        Ok(())
    }

    /// Unregister the source without ending the session.
    pub fn pause(&mut self) {
        if self.state == SessionState::Listening {
            self.source.stop();
            self.state = SessionState::Suspended;
            tracing::debug!("Sample source unregistered");
        }
    }

    /// End the session: unregister, discard the partial window and cancel
    /// outstanding classifications. Calling this twice is a no-op.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.source.stop();
        if !self.buffer.is_empty() {
            tracing::debug!(
                cursor = self.buffer.cursor(),
                "Discarding partial window"
            );
        }
        self.buffer.clear();
        self.dispatcher.shutdown();
        self.state = SessionState::Stopped;
        tracing::info!("Listening session stopped");
    }

    /// Deliver one reading.
    ///
    /// Readings arriving while the session is not listening are ignored.
    /// Returns the outcome when the reading completed a window and the
    /// sync policy classified it inline.
    pub fn on_sample(
        &mut self,
        sample: AccelSample,
    ) -> Result<Option<ClassificationOutcome>, SessionError> {
        if self.state != SessionState::Listening {
            tracing::trace!("Reading ignored, session not listening");
            return Ok(None);
        }

        self.stats.record_sample();
        self.latest = Some(sample);
        tracing::debug!(
            "Acc X = {:.3}, Acc Y = {:.3}, Acc Z = {:.3}",
            sample.x,
            sample.y,
            sample.z
        );

        let Some(request) = self.buffer.push(sample.x, sample.y, sample.z) else {
            return Ok(None);
        };

        if self.config.unregister_on_full {
            self.pause();
        }

        match self.dispatcher.submit(request) {
            Ok(outcome) => Ok(outcome),
            // Already logged and counted by the dispatcher
            Err(DispatchError::Backlogged { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-register the source if the sampling interval has elapsed.
    pub fn duty_cycle(&mut self) -> Result<(), SessionError> {
        let due = self
            .last_registration
            .map(|at| at.elapsed() >= self.config.sampling_interval)
            .unwrap_or(false);

        if due {
            match self.state {
                SessionState::Suspended => self.register()?,
                SessionState::Listening => self.last_registration = Some(Instant::now()),
                SessionState::Idle | SessionState::Stopped => {}
            }
        }
        Ok(())
    }

    /// Drain outcomes completed in the background.
    pub fn poll_outcomes(&self) -> Vec<ClassificationOutcome> {
        self.dispatcher.poll()
    }

    /// Run until `running` is cleared or the source is exhausted, then stop.
    ///
    /// `on_outcome` is called for every classification result.
    pub fn run<F>(&mut self, running: &AtomicBool, mut on_outcome: F) -> Result<(), SessionError>
    where
        F: FnMut(&ClassificationOutcome),
    {
        self.start()?;
        tracing::info!(
            policy = %self.dispatcher.policy(),
            capacity = self.buffer.capacity(),
            "Listening session started"
        );

        let receiver = self.source.receiver().clone();
        let result = loop {
            if !running.load(Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(e) = self.duty_cycle() {
                break Err(e);
            }

            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(sample) => match self.on_sample(sample) {
                    Ok(Some(outcome)) => on_outcome(&outcome),
                    Ok(None) => {}
                    Err(e) => break Err(e),
                },
                Err(RecvTimeoutError::Timeout) => {
                    if self.source.is_exhausted()
                        && receiver.is_empty()
                        && self.dispatcher.in_flight() == 0
                    {
                        tracing::info!("Sample source exhausted");
                        for outcome in self.poll_outcomes() {
                            on_outcome(&outcome);
                        }
                        break Ok(());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Sample source disconnected unexpectedly");
                    break Ok(());
                }
            }

            for outcome in self.poll_outcomes() {
                on_outcome(&outcome);
            }
        };

        self.stop();
        result
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Buffer write cursor, in floats.
    pub fn cursor(&self) -> usize {
        self.buffer.cursor()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// The most recent reading written to the buffer.
    pub fn latest_reading(&self) -> Option<AccelSample> {
        self.latest
    }

    /// Classifier labels in class order.
    pub fn labels(&self) -> &[String] {
        self.classifier.labels()
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: SampleSource> Drop for ListeningSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
