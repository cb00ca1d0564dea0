//! Activity classifiers.
//!
//! The session treats a classifier as a black box: it is initialized once
//! with the model/label locations and input shape, then asked to classify
//! full sample windows. Two back-ends are built in:
//!
//! - [`HeuristicClassifier`]: statistical rules over the window, no model file
//! - [`LinearClassifier`]: a linear model loaded from a JSON file

pub mod heuristic;
pub mod labels;
pub mod linear;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub use heuristic::HeuristicClassifier;
pub use labels::{load_labels, DEFAULT_LABELS};
pub use linear::{LinearClassifier, LinearModel};

/// Initialization parameters for a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Model file, if the back-end needs one
    pub model_path: Option<PathBuf>,
    /// Label file, one label per line
    pub label_path: Option<PathBuf>,
    /// Number of output classes
    pub num_classes: usize,
    /// Readings per window
    pub n_steps: usize,
    /// Values per reading
    pub n_input: usize,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            model_path: None,
            label_path: None,
            num_classes: 4,
            n_steps: 50,
            n_input: 3,
        }
    }
}

impl ClassifierParams {
    /// Number of floats a window must contain.
    pub fn input_len(&self) -> usize {
        self.n_steps * self.n_input
    }
}

/// Output of a single classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Winning class, or `None` when no class scored above zero
    pub label_index: Option<usize>,
    /// Per-class scores in label order
    pub scores: Vec<f32>,
}

impl Prediction {
    /// Build a prediction from scores, selecting the winner with [`argmax_positive`].
    pub fn from_scores(scores: Vec<f32>) -> Self {
        Self {
            label_index: argmax_positive(&scores),
            scores,
        }
    }

    /// Label index as a signed integer, `-1` when there is no winner.
    pub fn as_raw_index(&self) -> i32 {
        self.label_index.map(|i| i as i32).unwrap_or(-1)
    }

    /// Score of the winning class.
    pub fn confidence(&self) -> Option<f32> {
        self.label_index.and_then(|i| self.scores.get(i).copied())
    }
}

/// Index of the largest score strictly above zero.
///
/// Ties keep the first index.
pub fn argmax_positive(scores: &[f32]) -> Option<usize> {
    let mut best = None;
    let mut max = 0.0f32;
    for (i, &score) in scores.iter().enumerate() {
        if score > max {
            max = score;
            best = Some(i);
        }
    }
    best
}

/// An activity classifier.
pub trait Classifier: Send + Sync {
    /// Load the model and labels. A second call on an initialized classifier is skipped.
    fn initialize(&mut self, params: &ClassifierParams) -> Result<(), ClassifierError>;

    /// Classify one window of interleaved `x, y, z` readings.
    fn classify(&self, data: &[f32]) -> Result<Prediction, ClassifierError>;

    /// Labels in class order. Empty before initialization.
    fn labels(&self) -> &[String];

    /// Check if [`Classifier::initialize`] has completed.
    fn is_initialized(&self) -> bool;

    /// Human-readable label for a class index.
    fn label_name(&self, index: usize) -> Option<&str> {
        self.labels().get(index).map(String::as_str)
    }
}

/// Which built-in back-end to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    Heuristic,
    Linear,
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(ClassifierKind::Heuristic),
            "linear" => Ok(ClassifierKind::Linear),
            other => Err(format!("unknown classifier '{other}'")),
        }
    }
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierKind::Heuristic => write!(f, "heuristic"),
            ClassifierKind::Linear => write!(f, "linear"),
        }
    }
}

/// Create and initialize a built-in classifier.
pub fn build_classifier(
    kind: ClassifierKind,
    params: &ClassifierParams,
) -> Result<Box<dyn Classifier>, ClassifierError> {
    let mut classifier: Box<dyn Classifier> = match kind {
        ClassifierKind::Heuristic => Box::new(HeuristicClassifier::new()),
        ClassifierKind::Linear => Box::new(LinearClassifier::new()),
    };
    classifier.initialize(params)?;
    Ok(classifier)
}

/// Classifier errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    NotInitialized,
    InputLength { expected: usize, actual: usize },
    ModelError(String),
    LabelError(String),
    IoError(String),
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::NotInitialized => write!(f, "Classifier is not initialized"),
            ClassifierError::InputLength { expected, actual } => {
                write!(f, "Input length mismatch: expected {expected}, got {actual}")
            }
            ClassifierError::ModelError(e) => write!(f, "Model error: {e}"),
            ClassifierError::LabelError(e) => write!(f, "Label error: {e}"),
            ClassifierError::IoError(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for ClassifierError {}
