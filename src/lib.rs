//! Accelerometer activity agent.
//!
//! Accumulates 3-axis accelerometer readings into fixed-size windows and
//! hands every full window to an activity classifier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Accel Activity Agent                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │  Collector  │──▶│   Sample    │──▶│ Dispatcher  │──▶ Classifier│
//! │  │ (register/  │   │   Buffer    │   │ (sync or    │             │
//! │  │ unregister) │   │ (150 floats)│   │  worker)    │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │                                             │                    │
//! │                                             ▼                    │
//! │                     ┌─────────────┐   ┌─────────────┐            │
//! │                     │    Stats    │◀──│   Records   │            │
//! │                     └─────────────┘   └─────────────┘            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use accel_activity_agent::{
//!     classifier::{build_classifier, ClassifierKind, ClassifierParams},
//!     collector::{AccelSample, ManualCollector},
//!     core::{ListeningSession, SessionConfig},
//!     stats::create_shared_stats,
//! };
//!
//! let classifier = build_classifier(ClassifierKind::Heuristic, &ClassifierParams::default())
//!     .expect("classifier");
//! let mut session = ListeningSession::new(
//!     ManualCollector::default(),
//!     Arc::from(classifier),
//!     SessionConfig::default(),
//!     create_shared_stats(),
//! )
//! .expect("session");
//!
//! session.start().expect("start");
//! session.on_sample(AccelSample::new(0.0, 0.0, 9.81)).expect("sample");
//! ```

pub mod classifier;
pub mod collector;
pub mod config;
pub mod core;
pub mod stats;

// Re-export key types at crate root for convenience
pub use classifier::{Classifier, ClassifierError, ClassifierParams, Prediction};
pub use collector::{AccelSample, CollectorConfig, CollectorError, SampleSource};
pub use config::{Config, SourceConfig};
pub use self::core::{
    ClassificationOutcome, ClassificationRecord, ClassificationRequest, DispatchPolicy,
    ListeningSession, RecordBuilder, SampleBuffer, SessionConfig,
};
pub use stats::{ClassificationStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
