//! Linear activity model loaded from JSON.
//!
//! Model file format:
//!
//! ```json
//! { "weights": [[...], ...], "bias": [...] }
//! ```
//!
//! `weights` holds one row of `n_steps * n_input` coefficients per class and
//! `bias` one value per class. Scores are softmax probabilities.

use crate::classifier::labels::load_labels;
use crate::classifier::{Classifier, ClassifierError, ClassifierParams, Prediction};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Weights of a linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl LinearModel {
    /// Load a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::IoError(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content).map_err(|e| ClassifierError::ModelError(e.to_string()))
    }

    /// Check the model shape against the initialization parameters.
    pub fn validate(&self, params: &ClassifierParams) -> Result<(), ClassifierError> {
        if self.weights.len() != params.num_classes {
            return Err(ClassifierError::ModelError(format!(
                "model has {} weight rows, expected {}",
                self.weights.len(),
                params.num_classes
            )));
        }
        if self.bias.len() != params.num_classes {
            return Err(ClassifierError::ModelError(format!(
                "model has {} bias values, expected {}",
                self.bias.len(),
                params.num_classes
            )));
        }
        if let Some((class, row)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != params.input_len())
        {
            return Err(ClassifierError::ModelError(format!(
                "weight row {class} has {} values, expected {}",
                row.len(),
                params.input_len()
            )));
        }
        Ok(())
    }

    /// Raw per-class logits.
    pub fn logits(&self, data: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(data).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect()
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Classifier backed by a [`LinearModel`].
#[derive(Debug, Default)]
pub struct LinearClassifier {
    model: Option<LinearModel>,
    input_len: usize,
    labels: Vec<String>,
}

impl LinearClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize from an in-memory model instead of a file.
    pub fn with_model(
        model: LinearModel,
        params: &ClassifierParams,
    ) -> Result<Self, ClassifierError> {
        model.validate(params)?;
        Ok(Self {
            model: Some(model),
            input_len: params.input_len(),
            labels: load_labels(params.label_path.as_deref(), params.num_classes)?,
        })
    }
}

impl Classifier for LinearClassifier {
    fn initialize(&mut self, params: &ClassifierParams) -> Result<(), ClassifierError> {
        if self.model.is_some() {
            tracing::info!("Linear model already loaded, skipping");
            return Ok(());
        }
        let path = params
            .model_path
            .as_deref()
            .ok_or_else(|| ClassifierError::ModelError("no model path configured".to_string()))?;

        let started = std::time::Instant::now();
        let model = LinearModel::load(path)?;
        *self = Self::with_model(model, params)?;
        tracing::info!(
            path = %path.display(),
            classes = params.num_classes,
            "Linear model loaded in {}ms",
            started.elapsed().as_millis()
        );
        Ok(())
    }

    fn classify(&self, data: &[f32]) -> Result<Prediction, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotInitialized)?;
        if data.len() != self.input_len {
            return Err(ClassifierError::InputLength {
                expected: self.input_len,
                actual: data.len(),
            });
        }
        Ok(Prediction::from_scores(softmax(&model.logits(data))))
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}
