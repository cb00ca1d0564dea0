//! Exportable classification records.
//!
//! Each record describes one classified window: when it filled, how long
//! classification took, and what the classifier returned.

use crate::core::dispatch::ClassificationOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record format version.
pub const RECORD_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "accel-activity-agent";

/// Producer metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// One classified window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub record_version: String,
    pub record_id: String,
    pub producer: RecordProducer,
    /// Host the agent ran on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Window sequence number within the session
    pub sequence: u64,
    /// When the window filled (RFC3339)
    pub requested_at: String,
    /// When classification finished (RFC3339)
    pub completed_at: String,
    pub latency_ms: f64,
    pub sample_count: usize,
    /// Winning class index, -1 when no class won or classification failed
    pub label_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Builds records that share producer and device metadata.
pub struct RecordBuilder {
    instance_id: Uuid,
    device_id: Option<String>,
}

impl RecordBuilder {
    /// Create a builder with a fresh instance ID and the local hostname.
    pub fn new() -> Self {
        let device_id = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok());
        Self {
            instance_id: Uuid::new_v4(),
            device_id,
        }
    }

    /// Override the device ID.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Get the instance ID.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a record from a classification outcome.
    pub fn build(&self, outcome: &ClassificationOutcome) -> ClassificationRecord {
        let (label_index, scores, error) = match &outcome.result {
            Ok(prediction) => (prediction.as_raw_index(), prediction.scores.clone(), None),
            Err(e) => (-1, Vec::new(), Some(e.to_string())),
        };

        ClassificationRecord {
            record_version: RECORD_VERSION.to_string(),
            record_id: Uuid::new_v4().to_string(),
            producer: RecordProducer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                instance_id: self.instance_id.to_string(),
            },
            device_id: self.device_id.clone(),
            sequence: outcome.sequence,
            requested_at: outcome.requested_at.to_rfc3339(),
            completed_at: outcome.completed_at.to_rfc3339(),
            latency_ms: outcome.latency.as_secs_f64() * 1000.0,
            sample_count: outcome.sample_count,
            label_index,
            label: outcome.label.clone(),
            scores,
            error,
        }
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, Prediction};
    use chrono::Utc;
    use std::time::Duration;

    fn outcome(result: Result<Prediction, ClassifierError>, label: Option<&str>) -> ClassificationOutcome {
        ClassificationOutcome {
            sequence: 7,
            sample_count: 150,
            requested_at: Utc::now(),
            completed_at: Utc::now(),
            latency: Duration::from_millis(3),
            label: label.map(str::to_string),
            result,
        }
    }

    #[test]
    fn test_record_from_prediction() {
        let builder = RecordBuilder::new().with_device_id("test-device");
        let record = builder.build(&outcome(
            Ok(Prediction::from_scores(vec![0.1, 0.8, 0.05, 0.05])),
            Some("walking"),
        ));

        assert_eq!(record.record_version, RECORD_VERSION);
        assert_eq!(record.producer.name, PRODUCER_NAME);
        assert_eq!(record.producer.instance_id, builder.instance_id().to_string());
        assert_eq!(record.device_id.as_deref(), Some("test-device"));
        assert_eq!(record.sequence, 7);
        assert_eq!(record.label_index, 1);
        assert_eq!(record.label.as_deref(), Some("walking"));
        assert!((record.latency_ms - 3.0).abs() < 1e-9);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_record_from_failure() {
        let record = RecordBuilder::new().build(&outcome(Err(ClassifierError::NotInitialized), None));

        assert_eq!(record.label_index, -1);
        assert!(record.scores.is_empty());
        assert_eq!(record.error.as_deref(), Some("Classifier is not initialized"));

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("scores").is_none());
        assert!(json.get("label").is_none());
    }
}
