//! End-to-end tests for the listening session.

use accel_activity_agent::classifier::{Classifier, ClassifierError, ClassifierParams, Prediction};
use accel_activity_agent::collector::{AccelSample, CollectorConfig, ManualCollector, ReplayCollector};
use accel_activity_agent::core::{DispatchPolicy, ListeningSession, SessionConfig, SessionState};
use accel_activity_agent::stats::create_shared_stats;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Records every window it is asked to classify.
struct RecordingClassifier {
    seen: Mutex<Vec<Vec<f32>>>,
    labels: Vec<String>,
}

impl RecordingClassifier {
    fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            labels: vec!["idle".into(), "moving".into()],
        }
    }

    fn windows(&self) -> Vec<Vec<f32>> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for RecordingClassifier {
    fn initialize(&mut self, _params: &ClassifierParams) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn classify(&self, data: &[f32]) -> Result<Prediction, ClassifierError> {
        self.seen.lock().unwrap().push(data.to_vec());
        Ok(Prediction::from_scores(vec![0.2, 0.8]))
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

/// Blocks inside `classify` until released.
struct GatedClassifier {
    entered: Sender<()>,
    gate: Receiver<()>,
    labels: Vec<String>,
}

impl Classifier for GatedClassifier {
    fn initialize(&mut self, _params: &ClassifierParams) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn classify(&self, _data: &[f32]) -> Result<Prediction, ClassifierError> {
        let _ = self.entered.send(());
        let _ = self.gate.recv();
        Ok(Prediction::from_scores(vec![1.0]))
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

fn gated() -> (Arc<GatedClassifier>, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = unbounded();
    let (gate_tx, gate_rx) = unbounded();
    let classifier = Arc::new(GatedClassifier {
        entered: entered_tx,
        gate: gate_rx,
        labels: vec!["only".into()],
    });
    (classifier, entered_rx, gate_tx)
}

fn session_with(
    classifier: Arc<dyn Classifier>,
    config: SessionConfig,
) -> ListeningSession<ManualCollector> {
    ListeningSession::new(
        ManualCollector::default(),
        classifier,
        config,
        create_shared_stats(),
    )
    .unwrap()
}

#[test]
fn test_fifty_triples_dispatch_exactly_once() {
    let classifier = Arc::new(RecordingClassifier::new());
    let config = SessionConfig {
        policy: DispatchPolicy::Sync,
        ..SessionConfig::default()
    };
    let mut session = session_with(classifier.clone(), config);
    session.start().unwrap();

    let mut outcomes = Vec::new();
    for _ in 0..50 {
        if let Some(outcome) = session.on_sample(AccelSample::new(1.0, 2.0, 3.0)).unwrap() {
            outcomes.push(outcome);
        }
    }

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].sample_count, 150);
    assert_eq!(outcomes[0].label.as_deref(), Some("moving"));

    let windows = classifier.windows();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].len(), 150);
    for (i, value) in windows[0].iter().enumerate() {
        assert_eq!(*value, [1.0, 2.0, 3.0][i % 3]);
    }

    assert_eq!(session.cursor(), 0);
    assert!(session.buffer().as_slice().iter().all(|v| *v == 0.0));

    let stats = session.stats().snapshot();
    assert_eq!(stats.samples_received, 50);
    assert_eq!(stats.dispatches, 1);
    assert_eq!(stats.classifications_completed, 1);
}

#[test]
fn test_cursor_tracks_triples_modulo_capacity() {
    let classifier = Arc::new(RecordingClassifier::new());
    let config = SessionConfig {
        policy: DispatchPolicy::Sync,
        unregister_on_full: false,
        ..SessionConfig::default()
    };
    let mut session = session_with(classifier.clone(), config);
    session.start().unwrap();

    for n in 0..137u32 {
        session
            .on_sample(AccelSample::new(n as f32, 0.0, 0.0))
            .unwrap();
    }

    assert_eq!(session.cursor(), (3 * 137) % 150);
    assert_eq!(classifier.windows().len(), 137 / 50);
    assert!(classifier.windows().iter().all(|w| w.len() == 150));
    // Second window starts where the first one ended
    assert_eq!(classifier.windows()[1][0], 50.0);
}

#[test]
fn test_async_outcome_arrives_through_poll() {
    let classifier = Arc::new(RecordingClassifier::new());
    let mut session = session_with(classifier, SessionConfig::default());
    session.start().unwrap();

    for _ in 0..50 {
        assert!(session
            .on_sample(AccelSample::new(0.0, 0.0, 9.81))
            .unwrap()
            .is_none());
    }
    assert_eq!(session.state(), SessionState::Suspended);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut outcomes = Vec::new();
    while outcomes.is_empty() && Instant::now() < deadline {
        outcomes = session.poll_outcomes();
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].sequence, 1);
    assert_eq!(outcomes[0].label_index(), Some(1));
}

#[test]
fn test_stop_cancels_running_classification() {
    let (classifier, entered, gate) = gated();
    let config = SessionConfig {
        buffer_capacity: 3,
        ..SessionConfig::default()
    };
    let mut session = session_with(classifier, config);
    session.start().unwrap();

    session.on_sample(AccelSample::new(1.0, 1.0, 1.0)).unwrap();
    entered
        .recv_timeout(Duration::from_secs(2))
        .expect("classification did not start");

    let release = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let _ = gate.send(());
    });
    session.stop();
    release.join().unwrap();

    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.poll_outcomes().is_empty());
    let stats = session.stats().snapshot();
    assert_eq!(stats.results_dropped, 1);
    assert_eq!(stats.classifications_completed, 0);
}

#[test]
fn test_full_queue_rejects_window() {
    let (classifier, entered, gate) = gated();
    let config = SessionConfig {
        buffer_capacity: 3,
        unregister_on_full: false,
        max_pending: 1,
        ..SessionConfig::default()
    };
    let mut session = session_with(classifier, config);
    session.start().unwrap();

    // First window occupies the worker
    session.on_sample(AccelSample::new(1.0, 1.0, 1.0)).unwrap();
    entered.recv_timeout(Duration::from_secs(2)).unwrap();
    // Second waits in the queue, third finds it full
    session.on_sample(AccelSample::new(2.0, 2.0, 2.0)).unwrap();
    session.on_sample(AccelSample::new(3.0, 3.0, 3.0)).unwrap();

    let stats = session.stats().snapshot();
    assert_eq!(stats.requests_rejected, 1);
    // Rejected windows are not dispatches
    assert_eq!(stats.dispatches, 2);
    assert_eq!(session.dispatcher().in_flight(), 2);

    gate.send(()).unwrap();
    gate.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut outcomes = Vec::new();
    while outcomes.len() < 2 && Instant::now() < deadline {
        outcomes.extend(session.poll_outcomes());
        thread::sleep(Duration::from_millis(5));
    }
    let sequences: Vec<u64> = outcomes.iter().map(|o| o.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[test]
fn test_run_until_replay_exhausted() {
    let readings: Vec<[f32; 3]> = (0..100).map(|i| [i as f32, 0.0, 9.81]).collect();
    let source = ReplayCollector::new(
        readings,
        CollectorConfig {
            rate_hz: 0,
            channel_capacity: 16,
        },
        false,
    )
    .unwrap();

    let classifier = Arc::new(RecordingClassifier::new());
    let config = SessionConfig {
        policy: DispatchPolicy::Sync,
        unregister_on_full: false,
        ..SessionConfig::default()
    };
    let mut session =
        ListeningSession::new(source, classifier.clone(), config, create_shared_stats()).unwrap();

    let running = AtomicBool::new(true);
    let mut sequences = Vec::new();
    session
        .run(&running, |outcome| sequences.push(outcome.sequence))
        .unwrap();

    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(classifier.windows()[1][0], 50.0);
}

#[test]
fn test_stop_discards_queued_window() {
    let (classifier, entered, gate) = gated();
    let config = SessionConfig {
        buffer_capacity: 3,
        unregister_on_full: false,
        max_pending: 1,
        ..SessionConfig::default()
    };
    let mut session = session_with(classifier, config);
    session.start().unwrap();

    session.on_sample(AccelSample::new(1.0, 1.0, 1.0)).unwrap();
    entered.recv_timeout(Duration::from_secs(2)).unwrap();
    // Waits in the queue behind the blocked classification
    session.on_sample(AccelSample::new(2.0, 2.0, 2.0)).unwrap();
    assert_eq!(session.dispatcher().in_flight(), 2);

    let release = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let _ = gate.send(());
    });
    session.stop();
    release.join().unwrap();

    // The queued window never reached the classifier
    assert!(entered.try_recv().is_err());
    let stats = session.stats().snapshot();
    assert_eq!(stats.results_dropped, 2);
    assert_eq!(stats.classifications_completed, 0);
    assert_eq!(session.dispatcher().in_flight(), 0);
}

#[test]
fn test_stop_does_not_wait_for_hung_classifier() {
    let (classifier, entered, gate) = gated();
    let config = SessionConfig {
        buffer_capacity: 3,
        shutdown_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    };
    let mut session = session_with(classifier, config);
    session.start().unwrap();

    session.on_sample(AccelSample::new(1.0, 1.0, 1.0)).unwrap();
    entered.recv_timeout(Duration::from_secs(2)).unwrap();

    let started = Instant::now();
    session.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(session.state(), SessionState::Stopped);

    // The detached worker still drops its late result
    gate.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while session.stats().snapshot().results_dropped == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(session.stats().snapshot().results_dropped, 1);
    assert!(session.poll_outcomes().is_empty());
}

#[test]
fn test_replay_resumes_after_unregister_on_full() {
    let readings: Vec<[f32; 3]> = (0..200).map(|i| [i as f32, 0.0, 9.81]).collect();
    let source = ReplayCollector::new(
        readings,
        CollectorConfig {
            rate_hz: 0,
            ..CollectorConfig::default()
        },
        false,
    )
    .unwrap();

    let classifier = Arc::new(RecordingClassifier::new());
    let config = SessionConfig {
        policy: DispatchPolicy::Sync,
        unregister_on_full: true,
        sampling_interval: Duration::from_millis(20),
        ..SessionConfig::default()
    };
    let mut session =
        ListeningSession::new(source, classifier.clone(), config, create_shared_stats()).unwrap();

    let running = AtomicBool::new(true);
    let mut sequences = Vec::new();
    session
        .run(&running, |outcome| sequences.push(outcome.sequence))
        .unwrap();

    assert_eq!(sequences, vec![1, 2, 3, 4]);
    let starts: Vec<f32> = classifier.windows().iter().map(|w| w[0]).collect();
    assert_eq!(starts, vec![0.0, 50.0, 100.0, 150.0]);
    assert_eq!(session.stats().snapshot().samples_received, 200);
}
