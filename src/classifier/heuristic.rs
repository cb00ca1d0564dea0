//! Rule-based activity classifier.
//!
//! Scores the four default activities from window statistics so the
//! pipeline works end to end without a trained model.

use crate::classifier::labels::load_labels;
use crate::classifier::{Classifier, ClassifierError, ClassifierParams, Prediction};
use crate::collector::types::AXES;
use crate::core::features::compute_features;

/// Magnitude spread below which the device is considered at rest.
const STILL_MAX_STD_DEV: f64 = 0.3;

/// Magnitude spread separating walking from running.
const WALKING_MAX_STD_DEV: f64 = 2.5;

/// Horizontal spread, relative to vertical, below which motion is a vertical lift.
const LIFT_MAX_HORIZONTAL_RATIO: f64 = 0.2;

/// Score given to the winning class; the rest share the remainder.
const WINNER_SCORE: f32 = 0.85;

/// Number of classes this classifier scores.
const CLASS_COUNT: usize = 4;

/// Classifier using thresholds on window statistics.
#[derive(Debug, Default)]
pub struct HeuristicClassifier {
    params: Option<ClassifierParams>,
    labels: Vec<String>,
}

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for HeuristicClassifier {
    fn initialize(&mut self, params: &ClassifierParams) -> Result<(), ClassifierError> {
        if self.params.is_some() {
            tracing::info!("Heuristic classifier already initialized, skipping");
            return Ok(());
        }
        if params.n_input != AXES {
            return Err(ClassifierError::ModelError(format!(
                "heuristic classifier needs {AXES} values per reading, got {}",
                params.n_input
            )));
        }
        if params.num_classes != CLASS_COUNT {
            return Err(ClassifierError::ModelError(format!(
                "heuristic classifier scores {CLASS_COUNT} classes, got {}",
                params.num_classes
            )));
        }

        self.labels = load_labels(params.label_path.as_deref(), params.num_classes)?;
        self.params = Some(params.clone());
        tracing::info!(
            n_steps = params.n_steps,
            n_input = params.n_input,
            "Heuristic classifier initialized"
        );
        Ok(())
    }

    fn classify(&self, data: &[f32]) -> Result<Prediction, ClassifierError> {
        let params = self.params.as_ref().ok_or(ClassifierError::NotInitialized)?;
        if data.len() != params.input_len() {
            return Err(ClassifierError::InputLength {
                expected: params.input_len(),
                actual: data.len(),
            });
        }

        let features = compute_features(data);
        let class = if features.magnitude_std_dev < STILL_MAX_STD_DEV {
            0
        } else if features.horizontal_std_dev()
            < LIFT_MAX_HORIZONTAL_RATIO * features.vertical_std_dev()
        {
            3
        } else if features.magnitude_std_dev < WALKING_MAX_STD_DEV {
            1
        } else {
            2
        };

        let rest = (1.0 - WINNER_SCORE) / (CLASS_COUNT - 1) as f32;
        let mut scores = vec![rest; CLASS_COUNT];
        scores[class] = WINNER_SCORE;

        tracing::debug!(
            magnitude_std_dev = features.magnitude_std_dev,
            class,
            "Heuristic classification"
        );
        Ok(Prediction::from_scores(scores))
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn is_initialized(&self) -> bool {
        self.params.is_some()
    }
}
