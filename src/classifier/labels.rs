//! Class label loading.

use crate::classifier::ClassifierError;
use std::path::Path;

/// Labels used when no label file is configured.
pub const DEFAULT_LABELS: [&str; 4] = ["still", "walking", "running", "weightlifting"];

/// Owned copy of [`DEFAULT_LABELS`].
pub fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Parse a label list, one label per line. Blank lines are skipped.
pub fn parse_labels(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load labels from a file, or the defaults when `path` is `None`.
///
/// Fails when the file yields fewer labels than `num_classes`.
pub fn load_labels(path: Option<&Path>, num_classes: usize) -> Result<Vec<String>, ClassifierError> {
    let labels = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ClassifierError::IoError(format!("{}: {e}", path.display())))?;
            let labels = parse_labels(&content);
            tracing::info!(
                "{} label strings loaded from {}",
                labels.len(),
                path.display()
            );
            labels
        }
        None => default_labels(),
    };

    if labels.len() < num_classes {
        return Err(ClassifierError::LabelError(format!(
            "{} labels for {num_classes} classes",
            labels.len()
        )));
    }
    Ok(labels)
}
