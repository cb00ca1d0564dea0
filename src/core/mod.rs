//! Core functionality for the activity agent.
//!
//! This module contains:
//! - The fixed-capacity sample buffer
//! - Dispatch of full windows to the classifier
//! - The listening session tying source, buffer and dispatcher together
//! - Window feature computation
//! - Exportable classification records

pub mod buffer;
pub mod dispatch;
pub mod features;
pub mod record;
pub mod session;

// Re-export commonly used types
pub use buffer::{BufferError, ClassificationRequest, SampleBuffer, DEFAULT_CAPACITY};
pub use dispatch::{
    run_classification, ClassificationOutcome, DispatchError, DispatchPolicy, Dispatcher,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use features::{compute_features, WindowFeatures};
pub use record::{ClassificationRecord, RecordBuilder, PRODUCER_NAME, RECORD_VERSION};
pub use session::{ListeningSession, SessionConfig, SessionError, SessionState};
