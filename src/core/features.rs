//! Feature computation over a window of accelerometer readings.
//!
//! Windows are flat `x, y, z, x, y, z, ...` sequences as produced by the
//! sample buffer. A trailing partial triple is ignored.

use crate::collector::types::AXES;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Summary statistics of one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    /// Number of complete readings in the window
    pub reading_count: usize,
    /// Per-axis mean
    pub axis_mean: [f64; AXES],
    /// Per-axis sample standard deviation
    pub axis_std_dev: [f64; AXES],
    /// Mean of the reading magnitudes
    pub magnitude_mean: f64,
    /// Sample standard deviation of the reading magnitudes
    pub magnitude_std_dev: f64,
    /// Largest reading magnitude
    pub peak_magnitude: f64,
}

impl WindowFeatures {
    /// Spread of the horizontal (x, y) axes combined.
    pub fn horizontal_std_dev(&self) -> f64 {
        self.axis_std_dev[0].hypot(self.axis_std_dev[1])
    }

    /// Spread of the vertical (z) axis.
    pub fn vertical_std_dev(&self) -> f64 {
        self.axis_std_dev[2]
    }
}

/// Compute features from an interleaved window.
pub fn compute_features(data: &[f32]) -> WindowFeatures {
    let readings: Vec<[f64; AXES]> = data
        .chunks_exact(AXES)
        .map(|c| [c[0] as f64, c[1] as f64, c[2] as f64])
        .collect();

    if readings.is_empty() {
        return WindowFeatures::default();
    }

    let mut axis_mean = [0.0; AXES];
    let mut axis_std_dev = [0.0; AXES];
    for axis in 0..AXES {
        let values: Vec<f64> = readings.iter().map(|r| r[axis]).collect();
        axis_mean[axis] = values.iter().mean();
        axis_std_dev[axis] = std_dev(&values);
    }

    let magnitudes: Vec<f64> = readings
        .iter()
        .map(|r| (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt())
        .collect();
    let peak_magnitude = magnitudes.iter().fold(0.0f64, |acc, &m| acc.max(m));

    WindowFeatures {
        reading_count: readings.len(),
        axis_mean,
        axis_std_dev,
        magnitude_mean: magnitudes.iter().mean(),
        magnitude_std_dev: std_dev(&magnitudes),
        peak_magnitude,
    }
}

/// Sample standard deviation, 0 for fewer than two values.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}
