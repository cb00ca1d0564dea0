//! Classification statistics.
//!
//! Counts what the agent has processed: readings, dispatched windows,
//! classification results and losses. Counters are atomics so the session
//! and the dispatch worker can update them concurrently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Live statistics for the current session.
#[derive(Debug)]
pub struct ClassificationStats {
    /// Readings delivered to the buffer
    samples_received: AtomicU64,
    /// Full windows handed to the classifier or its queue
    dispatches: AtomicU64,
    /// Classifications that produced a prediction
    classifications_completed: AtomicU64,
    /// Classifications that returned an error
    classification_failures: AtomicU64,
    /// Windows rejected because the dispatch queue was full
    requests_rejected: AtomicU64,
    /// Windows or results discarded by cancellation
    results_dropped: AtomicU64,
    /// Completed classifications per label
    label_counts: Mutex<BTreeMap<String, u64>>,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ClassificationStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self {
            samples_received: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            classifications_completed: AtomicU64::new(0),
            classification_failures: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            results_dropped: AtomicU64::new(0),
            label_counts: Mutex::new(BTreeMap::new()),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create statistics that persist to `path`, resuming saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous statistics: {e}");
        }

        stats
    }

    pub fn record_sample(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed classification, with its label when one won.
    pub fn record_classification(&self, label: Option<&str>) {
        self.classifications_completed
            .fetch_add(1, Ordering::Relaxed);
        let key = label.unwrap_or("none").to_string();
        *self.labels_mut().entry(key).or_insert(0) += 1;
    }

    pub fn record_failure(&self) {
        self.classification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.results_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn labels_mut(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, u64>> {
        self.label_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            classifications_completed: self.classifications_completed.load(Ordering::Relaxed),
            classification_failures: self.classification_failures.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            results_dropped: self.results_dropped.load(Ordering::Relaxed),
            label_counts: self.labels_mut().clone(),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        let mut summary = format!(
            "Session Statistics:\n\
             - Samples received: {}\n\
             - Windows dispatched: {}\n\
             - Classifications completed: {}\n\
             - Classification failures: {}\n\
             - Windows rejected (queue full): {}\n\
             - Results dropped (cancelled): {}\n\
             - Session duration: {} seconds",
            stats.samples_received,
            stats.dispatches,
            stats.classifications_completed,
            stats.classification_failures,
            stats.requests_rejected,
            stats.results_dropped,
            stats.session_duration_secs
        );
        if !stats.label_counts.is_empty() {
            summary.push_str("\n\nActivity Counts:");
            for (label, count) in &stats.label_counts {
                summary.push_str(&format!("\n - {label}: {count}"));
            }
        }
        summary
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                samples_received: stats.samples_received,
                dispatches: stats.dispatches,
                classifications_completed: stats.classifications_completed,
                classification_failures: stats.classification_failures,
                requests_rejected: stats.requests_rejected,
                results_dropped: stats.results_dropped,
                label_counts: stats.label_counts,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_received
                    .store(persisted.samples_received, Ordering::Relaxed);
                self.dispatches
                    .store(persisted.dispatches, Ordering::Relaxed);
                self.classifications_completed
                    .store(persisted.classifications_completed, Ordering::Relaxed);
                self.classification_failures
                    .store(persisted.classification_failures, Ordering::Relaxed);
                self.requests_rejected
                    .store(persisted.requests_rejected, Ordering::Relaxed);
                self.results_dropped
                    .store(persisted.results_dropped, Ordering::Relaxed);
                *self.labels_mut() = persisted.label_counts;
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_received.store(0, Ordering::Relaxed);
        self.dispatches.store(0, Ordering::Relaxed);
        self.classifications_completed.store(0, Ordering::Relaxed);
        self.classification_failures.store(0, Ordering::Relaxed);
        self.requests_rejected.store(0, Ordering::Relaxed);
        self.results_dropped.store(0, Ordering::Relaxed);
        self.labels_mut().clear();
    }
}

impl Default for ClassificationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub samples_received: u64,
    pub dispatches: u64,
    pub classifications_completed: u64,
    pub classification_failures: u64,
    pub requests_rejected: u64,
    pub results_dropped: u64,
    pub label_counts: BTreeMap<String, u64>,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_received: u64,
    dispatches: u64,
    classifications_completed: u64,
    classification_failures: u64,
    requests_rejected: u64,
    results_dropped: u64,
    #[serde(default)]
    label_counts: BTreeMap<String, u64>,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared statistics.
pub type SharedStats = Arc<ClassificationStats>;

/// Create new shared statistics.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(ClassificationStats::new())
}

/// Create new shared statistics with persistence.
pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedStats {
    Arc::new(ClassificationStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = ClassificationStats::new();
        stats.record_sample();
        stats.record_sample();
        stats.record_dispatch();
        stats.record_classification(Some("walking"));
        stats.record_classification(Some("walking"));
        stats.record_classification(None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples_received, 2);
        assert_eq!(snapshot.dispatches, 1);
        assert_eq!(snapshot.classifications_completed, 3);
        assert_eq!(snapshot.label_counts.get("walking"), Some(&2));
        assert_eq!(snapshot.label_counts.get("none"), Some(&1));
    }

    #[test]
    fn test_reset() {
        let stats = ClassificationStats::new();
        stats.record_failure();
        stats.record_dropped();
        stats.record_classification(Some("still"));
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.classification_failures, 0);
        assert_eq!(snapshot.results_dropped, 0);
        assert!(snapshot.label_counts.is_empty());
    }

    #[test]
    fn test_summary_format() {
        let stats = ClassificationStats::new();
        stats.record_classification(Some("running"));
        let summary = stats.summary();

        assert!(summary.contains("Samples received"));
        assert!(summary.contains("Results dropped"));
        assert!(summary.contains("running: 1"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join("accel-activity-agent-stats-test")
            .join("stats.json");
        let _ = std::fs::remove_file(&path);

        let stats = ClassificationStats::with_persistence(path.clone());
        stats.record_sample();
        stats.record_classification(Some("still"));
        stats.save().unwrap();

        let resumed = ClassificationStats::with_persistence(path.clone());
        let snapshot = resumed.snapshot();
        assert_eq!(snapshot.samples_received, 1);
        assert_eq!(snapshot.label_counts.get("still"), Some(&1));

        let _ = std::fs::remove_file(&path);
    }
}
