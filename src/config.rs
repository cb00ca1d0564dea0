//! Configuration for the activity agent.

use crate::classifier::{ClassifierKind, ClassifierParams};
use crate::collector::types::{SyntheticPattern, AXES};
use crate::collector::CollectorConfig;
use crate::core::buffer::DEFAULT_CAPACITY;
use crate::core::dispatch::{DispatchPolicy, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::core::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Directory name under the platform config/data directories.
const APP_DIR: &str = "accel-activity-agent";

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Period of the source re-registration duty cycle
    #[serde(with = "duration_ms_serde")]
    pub sampling_interval: Duration,

    /// Floats per classification window
    pub buffer_capacity: usize,

    /// How windows are handed to the classifier
    pub dispatch: DispatchConfig,

    /// Which classifier to load
    pub classifier: ClassifierConfig,

    /// Where readings come from
    pub source: SourceConfig,

    /// Path for exporting classification records
    pub export_path: PathBuf,

    /// Path for storing statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            sampling_interval: Duration::from_millis(5000),
            buffer_capacity: DEFAULT_CAPACITY,
            dispatch: DispatchConfig::default(),
            classifier: ClassifierConfig::default(),
            source: SourceConfig::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Check that the buffer and classifier shapes agree.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 || self.buffer_capacity % AXES != 0 {
            return Err(ConfigError::Invalid(format!(
                "buffer_capacity {} is not a positive multiple of {AXES}",
                self.buffer_capacity
            )));
        }
        let input_len = self.classifier.n_steps * self.classifier.n_input;
        if self.buffer_capacity != input_len {
            return Err(ConfigError::Invalid(format!(
                "buffer_capacity {} does not match classifier input {} x {}",
                self.buffer_capacity, self.classifier.n_steps, self.classifier.n_input
            )));
        }
        if self.classifier.kind == ClassifierKind::Linear && self.classifier.model_path.is_none() {
            return Err(ConfigError::Invalid(
                "linear classifier requires a model_path".to_string(),
            ));
        }
        if self.source.kind == SourceKind::Replay && self.source.replay_path.is_none() {
            return Err(ConfigError::Invalid(
                "replay source requires a replay_path".to_string(),
            ));
        }
        Ok(())
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_capacity: self.buffer_capacity,
            policy: self.dispatch.policy,
            unregister_on_full: self.dispatch.unregister_on_full,
            max_pending: self.dispatch.max_pending,
            sampling_interval: self.sampling_interval,
            shutdown_timeout: self.dispatch.shutdown_timeout,
        }
    }

    /// Path of the persisted statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }
}

/// Dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub policy: DispatchPolicy,
    /// Unregister the source while a full window is classified
    pub unregister_on_full: bool,
    /// Bound of the async dispatch queue
    pub max_pending: usize,
    /// How long stopping waits for a running classification
    #[serde(with = "duration_ms_serde", default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
}

fn default_shutdown_timeout() -> Duration {
    DEFAULT_SHUTDOWN_TIMEOUT
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::Async,
            unregister_on_full: true,
            max_pending: 1,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,
    pub model_path: Option<PathBuf>,
    pub label_path: Option<PathBuf>,
    pub num_classes: usize,
    pub n_steps: usize,
    pub n_input: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let params = ClassifierParams::default();
        Self {
            kind: ClassifierKind::Heuristic,
            model_path: params.model_path,
            label_path: params.label_path,
            num_classes: params.num_classes,
            n_steps: params.n_steps,
            n_input: params.n_input,
        }
    }
}

impl ClassifierConfig {
    /// Initialization parameters for the classifier.
    pub fn params(&self) -> ClassifierParams {
        ClassifierParams {
            model_path: self.model_path.clone(),
            label_path: self.label_path.clone(),
            num_classes: self.num_classes,
            n_steps: self.n_steps,
            n_input: self.n_input,
        }
    }
}

/// Kind of sample source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Synthetic,
    Replay,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synthetic" => Ok(SourceKind::Synthetic),
            "replay" => Ok(SourceKind::Replay),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}

/// Sample source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Readings per second
    pub rate_hz: u32,
    /// Waveform for the synthetic source
    pub pattern: SyntheticPattern,
    /// Recording for the replay source
    pub replay_path: Option<PathBuf>,
    /// Restart the recording when it ends
    pub loop_replay: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            rate_hz: 50,
            pattern: SyntheticPattern::Walking,
            replay_path: None,
            loop_replay: false,
        }
    }
}

impl SourceConfig {
    /// Collector settings for this source.
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            rate_hz: self.rate_hz,
            ..CollectorConfig::default()
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as milliseconds.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sampling_interval, Duration::from_millis(5000));
        assert_eq!(config.buffer_capacity, 150);
        assert_eq!(config.dispatch.policy, DispatchPolicy::Async);
        assert!(config.dispatch.unregister_on_full);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_shape_mismatch() {
        let mut config = Config::default();
        config.classifier.n_steps = 40;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not match"));

        config.buffer_capacity = 121;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_missing_paths() {
        let mut config = Config::default();
        config.classifier.kind = ClassifierKind::Linear;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.kind = SourceKind::Replay;
        assert!(config.validate().is_err());
        config.source.replay_path = Some(PathBuf::from("walk.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join("accel-activity-agent-config-test")
            .join("config.json");
        let mut config = Config::default();
        config.dispatch.policy = DispatchPolicy::Sync;
        config.sampling_interval = Duration::from_millis(1500);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.dispatch.policy, DispatchPolicy::Sync);
        assert_eq!(loaded.sampling_interval, Duration::from_millis(1500));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_session_config_mapping() {
        let config = Config::default();
        let session = config.session_config();
        assert_eq!(session.buffer_capacity, config.buffer_capacity);
        assert_eq!(session.policy, config.dispatch.policy);
        assert_eq!(session.sampling_interval, config.sampling_interval);
        assert_eq!(session.shutdown_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_shutdown_timeout_defaults_when_absent() {
        let mut value = serde_json::to_value(Config::default()).unwrap();
        value["dispatch"]
            .as_object_mut()
            .unwrap()
            .remove("shutdown_timeout");
        let config: Config = serde_json::from_value(value).unwrap();
        assert_eq!(config.dispatch.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("replay".parse(), Ok(SourceKind::Replay));
        assert!("camera".parse::<SourceKind>().is_err());
    }
}
