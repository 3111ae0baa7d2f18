//! Bounded sample history
//!
//! A fixed-capacity ring of samples in insertion order. The oldest sample is
//! evicted when a new one arrives at capacity. Analyzers only ever see a
//! read-only slice view.

use crate::models::Sample;
use std::collections::VecDeque;

/// Default history capacity
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Fixed-capacity, insertion-ordered sample history
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, sample: Sample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.samples.make_contiguous();
    }

    /// All samples, oldest first
    pub fn all(&self) -> &[Sample] {
        // push keeps the ring contiguous, so the front slice is everything
        self.samples.as_slices().0
    }

    /// Newest sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Oldest retained sample
    pub fn earliest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample, keeping the capacity
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Change capacity, keeping the newest samples
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Milliseconds between the oldest and newest sample
    ///
    /// Saturates at 0 if timestamps went backwards.
    pub fn observation_span_ms(&self) -> u64 {
        match (self.earliest(), self.latest()) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => 0,
        }
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: u64) -> Sample {
        Sample::new(i * 1000, 1_000 + i, 10_000, 20_000)
    }

    #[test]
    fn test_push_and_latest() {
        let mut history = HistoryBuffer::new(5);
        assert!(history.latest().is_none());

        history.push(sample(0));
        history.push(sample(1));

        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().used, 1_001);
        assert_eq!(history.all().len(), 2);
    }

    #[test]
    fn test_overflow_keeps_last_n() {
        let capacity = 10;
        let mut history = HistoryBuffer::new(capacity);

        for k in 0..37u64 {
            history.push(sample(k));
            if k as usize >= capacity {
                assert_eq!(history.all().len(), capacity);
                // Oldest retained is the (k - N + 1)th pushed
                assert_eq!(history.all()[0], sample(k + 1 - capacity as u64));
            }
        }

        let all = history.all();
        assert_eq!(all.first().unwrap().used, 1_027);
        assert_eq!(all.last().unwrap().used, 1_036);
    }

    #[test]
    fn test_resize_keeps_newest() {
        let mut history = HistoryBuffer::new(8);
        for k in 0..8 {
            history.push(sample(k));
        }

        history.resize(3);
        assert_eq!(history.len(), 3);
        assert_eq!(history.earliest().unwrap().used, 1_005);
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = HistoryBuffer::new(0);
        history.push(sample(1));
        history.push(sample(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().used, 1_002);
    }

    #[test]
    fn test_observation_span() {
        let mut history = HistoryBuffer::new(4);
        assert_eq!(history.observation_span_ms(), 0);
        history.push(sample(2));
        history.push(sample(7));
        assert_eq!(history.observation_span_ms(), 5_000);
    }
}
