//! Fixed-capacity sample buffer.
//!
//! Readings are appended as `x, y, z` triples. When the cursor reaches
//! capacity the contents are copied into a [`ClassificationRequest`], the
//! live buffer is zero-filled and the cursor returns to 0.

use crate::collector::types::AXES;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Default capacity: 50 readings of 3 axes.
pub const DEFAULT_CAPACITY: usize = 50 * AXES;

/// Immutable snapshot of a full buffer, handed to a classifier.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    sequence: u64,
    created_at: DateTime<Utc>,
    data: Arc<[f32]>,
}

impl ClassificationRequest {
    /// Snapshot number within its buffer, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the buffer filled.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of floats in the snapshot.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The snapshot contents.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Buffer errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    InvalidCapacity(usize),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::InvalidCapacity(c) => {
                write!(f, "Buffer capacity {c} is not a positive multiple of {AXES}")
            }
        }
    }
}

impl std::error::Error for BufferError {}

/// Accumulates readings until full.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    data: Vec<f32>,
    count: usize,
    dispatched: u64,
}

impl SampleBuffer {
    /// Create a buffer holding `capacity` floats.
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 || capacity % AXES != 0 {
            return Err(BufferError::InvalidCapacity(capacity));
        }
        Ok(Self {
            data: vec![0.0; capacity],
            count: 0,
            dispatched: 0,
        })
    }

    /// Append one reading.
    ///
    /// Returns the snapshot when this reading filled the buffer.
    pub fn push(&mut self, x: f32, y: f32, z: f32) -> Option<ClassificationRequest> {
        self.data[self.count] = x;
        self.data[self.count + 1] = y;
        self.data[self.count + 2] = z;
        self.count += AXES;

        if self.count >= self.data.len() {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Copy out the contents, zero the buffer and reset the cursor.
    fn drain(&mut self) -> ClassificationRequest {
        let snapshot: Arc<[f32]> = Arc::from(&self.data[..self.count]);
        self.data.fill(0.0);
        self.count = 0;
        self.dispatched += 1;

        ClassificationRequest {
            sequence: self.dispatched,
            created_at: Utc::now(),
            data: snapshot,
        }
    }

    /// Discard a partial window without producing a snapshot.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.count = 0;
    }

    /// Write cursor, in floats.
    pub fn cursor(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Readings still needed before the next snapshot.
    pub fn remaining_readings(&self) -> usize {
        (self.data.len() - self.count) / AXES
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Snapshots produced so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// The live contents, including unwritten zero slots.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self {
            data: vec![0.0; DEFAULT_CAPACITY],
            count: 0,
            dispatched: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_capacity() {
        assert_eq!(
            SampleBuffer::with_capacity(0).unwrap_err(),
            BufferError::InvalidCapacity(0)
        );
        assert!(SampleBuffer::with_capacity(151).is_err());
        assert!(SampleBuffer::with_capacity(9).is_ok());
    }

    #[test]
    fn test_fifty_triples_fill_default_buffer() {
        let mut buffer = SampleBuffer::default();
        let mut requests = Vec::new();
        for _ in 0..50 {
            if let Some(request) = buffer.push(1.0, 2.0, 3.0) {
                requests.push(request);
            }
        }

        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.len(), DEFAULT_CAPACITY);
        assert_eq!(request.sequence(), 1);
        for (i, value) in request.data().iter().enumerate() {
            assert_eq!(*value, [1.0, 2.0, 3.0][i % 3]);
        }

        assert_eq!(buffer.cursor(), 0);
        assert!(buffer.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_cursor_wraps_modulo_capacity() {
        let mut buffer = SampleBuffer::with_capacity(12).unwrap();
        let mut dispatches = 0;
        for n in 1..=11u32 {
            if buffer.push(n as f32, 0.0, 0.0).is_some() {
                dispatches += 1;
            }
            assert_eq!(buffer.cursor(), (3 * n as usize) % 12);
        }
        assert_eq!(dispatches, 2);
        assert_eq!(buffer.dispatched(), 2);
        assert_eq!(buffer.remaining_readings(), 1);
    }

    #[test]
    fn test_snapshot_independent_of_buffer() {
        let mut buffer = SampleBuffer::with_capacity(3).unwrap();
        let first = buffer.push(1.0, 1.0, 1.0).unwrap();
        let second = buffer.push(2.0, 2.0, 2.0).unwrap();
        assert_eq!(first.data(), &[1.0, 1.0, 1.0]);
        assert_eq!(second.data(), &[2.0, 2.0, 2.0]);
        assert_eq!(second.sequence(), 2);
    }

    #[test]
    fn test_clear_discards_partial_window() {
        let mut buffer = SampleBuffer::default();
        buffer.push(5.0, 5.0, 5.0);
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.as_slice().iter().all(|v| *v == 0.0));
        assert_eq!(buffer.dispatched(), 0);
    }
}
