//! Hand-off of full windows to the classifier.
//!
//! Two policies:
//!
//! - **sync**: classify inline on the delivering thread; delivery of further
//!   readings waits until the classifier returns.
//! - **async**: classify on one background worker per session, fed by a
//!   bounded queue. When the queue is full the new window is rejected.
//!
//! [`Dispatcher::shutdown`] cancels the worker: queued windows are
//! discarded and a classification already running completes, but its result
//! is dropped. Shutdown waits for the worker at most the shutdown timeout;
//! a worker stuck in the classifier is detached.

use crate::classifier::{Classifier, ClassifierError, Prediction};
use crate::core::buffer::ClassificationRequest;
use crate::stats::SharedStats;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default bound on how long shutdown waits for a running classification.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Where classification runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    Sync,
    Async,
}

impl FromStr for DispatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sync" => Ok(DispatchPolicy::Sync),
            "async" => Ok(DispatchPolicy::Async),
            other => Err(format!("unknown dispatch policy '{other}'")),
        }
    }
}

impl std::fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchPolicy::Sync => write!(f, "sync"),
            DispatchPolicy::Async => write!(f, "async"),
        }
    }
}

/// Result of classifying one window.
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    /// Sequence number of the window
    pub sequence: u64,
    /// Floats in the window
    pub sample_count: usize,
    /// When the window filled
    pub requested_at: DateTime<Utc>,
    /// When the classifier returned
    pub completed_at: DateTime<Utc>,
    /// Time spent inside the classifier
    pub latency: Duration,
    /// Name of the winning label, when there is one
    pub label: Option<String>,
    pub result: Result<Prediction, ClassifierError>,
}

impl ClassificationOutcome {
    /// Winning label index, if classification succeeded and a class won.
    pub fn label_index(&self) -> Option<usize> {
        self.result.as_ref().ok().and_then(|p| p.label_index)
    }
}

/// Dispatch errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The queue is full; the window was discarded
    Backlogged { sequence: u64 },
    /// The dispatcher has been shut down
    ShutDown,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Backlogged { sequence } => {
                write!(f, "Dispatch queue full, window {sequence} discarded")
            }
            DispatchError::ShutDown => write!(f, "Dispatcher is shut down"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Classify a window and time it.
pub fn run_classification(
    classifier: &dyn Classifier,
    request: &ClassificationRequest,
) -> ClassificationOutcome {
    tracing::info!(
        sequence = request.sequence(),
        "Buffer full, len = {}",
        request.len()
    );

    let started = Instant::now();
    let result = classifier.classify(request.data());
    let latency = started.elapsed();

    let label = result
        .as_ref()
        .ok()
        .and_then(|p| p.label_index)
        .and_then(|i| classifier.label_name(i))
        .map(str::to_string);

    match &result {
        Ok(prediction) => tracing::info!(
            sequence = request.sequence(),
            label = label.as_deref().unwrap_or("none"),
            latency_ms = latency.as_millis() as u64,
            "Classification result = {}",
            prediction.as_raw_index()
        ),
        Err(e) => tracing::warn!(sequence = request.sequence(), "Classification failed: {e}"),
    }

    ClassificationOutcome {
        sequence: request.sequence(),
        sample_count: request.len(),
        requested_at: request.created_at(),
        completed_at: Utc::now(),
        latency,
        label,
        result,
    }
}

fn record_outcome(stats: &SharedStats, outcome: &ClassificationOutcome) {
    match outcome.result {
        Ok(_) => stats.record_classification(outcome.label.as_deref()),
        Err(_) => stats.record_failure(),
    }
}

struct Worker {
    requests: Sender<ClassificationRequest>,
    cancelled: Arc<AtomicBool>,
    /// Disconnects when the worker thread exits
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Sends full windows to the classifier under a [`DispatchPolicy`].
pub struct Dispatcher {
    policy: DispatchPolicy,
    classifier: Arc<dyn Classifier>,
    stats: SharedStats,
    worker: Option<Worker>,
    in_flight: Arc<AtomicUsize>,
    results: Receiver<ClassificationOutcome>,
    shutdown_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher; the async policy starts its worker immediately.
    ///
    /// `max_pending` bounds the async queue and is raised to at least 1.
    pub fn new(
        policy: DispatchPolicy,
        classifier: Arc<dyn Classifier>,
        stats: SharedStats,
        max_pending: usize,
    ) -> Self {
        let (results_tx, results) = unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker = match policy {
            DispatchPolicy::Sync => None,
            DispatchPolicy::Async => Some(spawn_worker(
                classifier.clone(),
                stats.clone(),
                in_flight.clone(),
                results_tx,
                max_pending.max(1),
            )),
        };

        Self {
            policy,
            classifier,
            stats,
            worker,
            in_flight,
            results,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Bound how long [`Dispatcher::shutdown`] waits for the worker.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Hand a window to the classifier.
    ///
    /// Under the sync policy the outcome is returned directly; under the
    /// async policy it arrives later through [`Dispatcher::poll`]. Only
    /// windows actually handed over count as dispatches.
    pub fn submit(
        &self,
        request: ClassificationRequest,
    ) -> Result<Option<ClassificationOutcome>, DispatchError> {
        match self.policy {
            DispatchPolicy::Sync => {
                self.stats.record_dispatch();
                let outcome = run_classification(self.classifier.as_ref(), &request);
                record_outcome(&self.stats, &outcome);
                Ok(Some(outcome))
            }
            DispatchPolicy::Async => {
                let worker = self.worker.as_ref().ok_or(DispatchError::ShutDown)?;
                let sequence = request.sequence();

                self.in_flight.fetch_add(1, Ordering::SeqCst);
                match worker.requests.try_send(request) {
                    Ok(()) => {
                        self.stats.record_dispatch();
                        Ok(None)
                    }
                    Err(TrySendError::Full(_)) => {
                        self.in_flight.fetch_sub(1, Ordering::SeqCst);
                        self.stats.record_rejected();
                        tracing::warn!(sequence, "Dispatch queue full, window discarded");
                        Err(DispatchError::Backlogged { sequence })
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        self.in_flight.fetch_sub(1, Ordering::SeqCst);
                        Err(DispatchError::ShutDown)
                    }
                }
            }
        }
    }

    /// Drain outcomes completed by the async worker.
    pub fn poll(&self) -> Vec<ClassificationOutcome> {
        self.results.try_iter().collect()
    }

    /// Wait up to `timeout` for the next async outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ClassificationOutcome> {
        self.results.recv_timeout(timeout).ok()
    }

    /// Windows queued or being classified.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Check if the dispatcher still accepts windows.
    pub fn is_active(&self) -> bool {
        match self.policy {
            DispatchPolicy::Sync => true,
            DispatchPolicy::Async => self.worker.is_some(),
        }
    }

    /// Cancel outstanding work and stop the worker. Idempotent.
    ///
    /// Waits up to the shutdown timeout for a running classification to
    /// return; after that the worker is detached and its result dropped
    /// whenever it finishes.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.cancelled.store(true, Ordering::SeqCst);
        drop(worker.requests);

        match worker.done.recv_timeout(self.shutdown_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "Classifier did not return in time, detaching dispatch worker"
                );
            }
            _ => {
                if worker.handle.join().is_err() {
                    tracing::error!("Dispatch worker panicked");
                }
                tracing::debug!("Dispatch worker stopped");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(
    classifier: Arc<dyn Classifier>,
    stats: SharedStats,
    in_flight: Arc<AtomicUsize>,
    results: Sender<ClassificationOutcome>,
    max_pending: usize,
) -> Worker {
    let (requests, queue) = bounded::<ClassificationRequest>(max_pending);
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancel_flag = cancelled.clone();
    let (done_tx, done) = bounded::<()>(0);

    let handle = thread::spawn(move || {
        let _done = done_tx;
        for request in queue.iter() {
            if cancel_flag.load(Ordering::SeqCst) {
                tracing::debug!(sequence = request.sequence(), "Queued window cancelled");
                stats.record_dropped();
                in_flight.fetch_sub(1, Ordering::SeqCst);
                continue;
            }

            let outcome = run_classification(classifier.as_ref(), &request);

            if cancel_flag.load(Ordering::SeqCst) {
                tracing::debug!(sequence = outcome.sequence, "Result dropped after cancellation");
                stats.record_dropped();
            } else {
                record_outcome(&stats, &outcome);
                if results.send(outcome).is_err() {
                    stats.record_dropped();
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    });

    Worker {
        requests,
        cancelled,
        done,
        handle,
    }
}
