//! Acceleration magnitude window.
//!
//! This module provides the moving-average baseline used by step detection:
//! a FIFO of the most recent sample magnitudes. The mean is summed fresh
//! from the window in f64, so one huge sample cannot leave rounding residue
//! behind once it has been evicted.
//!
//! Magnitude (not a single axis) is used so that phone orientation in a
//! pocket, hand or bag does not change the signal.

use std::collections::VecDeque;

use crate::types::AccelerationSample;

/// Sliding buffer of the most recent acceleration magnitudes.
#[derive(Debug, Clone)]
pub struct AccelerationWindow {
    magnitudes: VecDeque<f32>,
    capacity: usize,
}

impl AccelerationWindow {
    /// Create an empty window holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            magnitudes: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one on overflow.
    ///
    /// Returns the magnitude of the pushed sample.
    pub fn push(&mut self, sample: &AccelerationSample) -> f32 {
        let magnitude = sample.magnitude();
        self.magnitudes.push_back(magnitude);
        if self.magnitudes.len() > self.capacity {
            self.magnitudes.pop_front();
        }
        magnitude
    }

    /// Mean magnitude over the window, 0 when empty.
    pub fn average(&self) -> f32 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.magnitudes.iter().map(|&m| m as f64).sum();
        (sum / self.magnitudes.len() as f64) as f32
    }

    /// True once the window holds a full baseline.
    pub fn is_full(&self) -> bool {
        self.magnitudes.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.magnitudes.clear();
    }
}
