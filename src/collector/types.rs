//! Sample types delivered by collectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of axes in one accelerometer reading.
pub const AXES: usize = 3;

/// A single 3-axis accelerometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    /// Timestamp when the reading was taken
    pub timestamp: DateTime<Utc>,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelSample {
    /// Create a reading stamped with the current time.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            x,
            y,
            z,
        }
    }

    /// The reading as an `[x, y, z]` triple.
    pub fn axes(&self) -> [f32; AXES] {
        [self.x, self.y, self.z]
    }

    /// Euclidean norm of the reading.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Waveform shapes produced by the synthetic collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticPattern {
    Still,
    Walking,
    Running,
    Weightlifting,
}

impl SyntheticPattern {
    /// Lowercase name, matching the default classifier labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntheticPattern::Still => "still",
            SyntheticPattern::Walking => "walking",
            SyntheticPattern::Running => "running",
            SyntheticPattern::Weightlifting => "weightlifting",
        }
    }
}

impl fmt::Display for SyntheticPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyntheticPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "still" => Ok(SyntheticPattern::Still),
            "walking" => Ok(SyntheticPattern::Walking),
            "running" => Ok(SyntheticPattern::Running),
            "weightlifting" => Ok(SyntheticPattern::Weightlifting),
            other => Err(format!("unknown pattern '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let sample = AccelSample::new(3.0, 4.0, 0.0);
        assert!((sample.magnitude() - 5.0).abs() < 1e-6);
        assert_eq!(sample.axes(), [3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_pattern_parsing() {
        assert_eq!(
            "Walking".parse::<SyntheticPattern>(),
            Ok(SyntheticPattern::Walking)
        );
        assert!("jogging".parse::<SyntheticPattern>().is_err());
        assert_eq!(SyntheticPattern::Weightlifting.to_string(), "weightlifting");
    }
}
