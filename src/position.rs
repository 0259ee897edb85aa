//! Position sampler and bounded position history.
//!
//! Raw geolocation fixes are admitted only when their accuracy radius is
//! good enough; everything else is GPS noise and is dropped without fuss.
//! Admitted positions go into a FIFO history that never grows past its
//! capacity, so downstream recomputation stays O(capacity).

use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::geo;
use crate::types::{Position, PositionFix};

/// Thresholds for admitting and interpreting geolocation fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    /// Maximum number of positions retained (oldest evicted first).
    pub history_capacity: usize,
    /// Fixes with an accuracy radius above this are discarded (meters).
    pub max_accuracy_m: f64,
    /// Hops at or above this length are treated as glitches (meters).
    pub max_jump_m: f64,
    /// Lower bound of the walking speed band (m/s).
    pub min_walking_speed_mps: f64,
    /// Upper bound of the walking speed band (m/s).
    pub max_walking_speed_mps: f64,
    /// Displacement that counts as moving (meters).
    pub moving_threshold_m: f64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            max_accuracy_m: geo::MAX_ACCURACY_M,
            max_jump_m: geo::MAX_JUMP_M,
            min_walking_speed_mps: geo::MIN_WALKING_SPEED_MPS,
            max_walking_speed_mps: geo::MAX_WALKING_SPEED_MPS,
            moving_threshold_m: geo::DEFAULT_MOVING_THRESHOLD_M,
        }
    }
}

/// Time-ordered, accuracy-filtered history of recent positions.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    positions: VecDeque<Position>,
    capacity: usize,
    max_accuracy_m: f64,
    rejected: u64,
}

impl PositionHistory {
    /// Create an empty history.
    pub fn new(config: &PositionConfig) -> Self {
        let capacity = config.history_capacity.max(1);
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
            max_accuracy_m: config.max_accuracy_m,
            rejected: 0,
        }
    }

    /// Offer a position with its accuracy radius.
    ///
    /// Returns true when the position was admitted. Inaccurate or
    /// out-of-range fixes are dropped silently.
    pub fn observe(&mut self, position: Position, accuracy_m: Option<f64>) -> bool {
        if !geo::is_accurate_within(accuracy_m, self.max_accuracy_m) || !position.is_valid() {
            self.rejected += 1;
            trace!("dropping position fix with accuracy {:?}", accuracy_m);
            return false;
        }

        self.positions.push_back(position);
        if self.positions.len() > self.capacity {
            self.positions.pop_front();
        }
        true
    }

    /// [`observe`](Self::observe) for a raw fix.
    pub fn observe_fix(&mut self, fix: &PositionFix) -> bool {
        self.observe(fix.position, fix.accuracy_m)
    }

    /// Number of positions currently held.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of fixes dropped by the accuracy filter since the last clear.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Oldest retained position.
    pub fn first(&self) -> Option<&Position> {
        self.positions.front()
    }

    /// Most recent position.
    pub fn latest(&self) -> Option<&Position> {
        self.positions.back()
    }

    /// The two most recent positions, oldest first.
    pub fn last_two(&self) -> Option<(&Position, &Position)> {
        let n = self.positions.len();
        if n < 2 {
            return None;
        }
        Some((&self.positions[n - 2], &self.positions[n - 1]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    /// Copy the history into a contiguous, time-ascending vector.
    pub fn to_vec(&self) -> Vec<Position> {
        self.positions.iter().copied().collect()
    }

    /// Contiguous view of the history, oldest first.
    pub fn as_slice(&mut self) -> &[Position] {
        self.positions.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.rejected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> PositionHistory {
        PositionHistory::new(&PositionConfig::default())
    }

    #[test]
    fn test_inaccurate_fix_is_dropped() {
        let mut h = history();
        assert!(!h.observe(Position::new(35.0, 139.0), Some(51.0)));
        assert!(!h.observe(Position::new(35.0, 139.0), None));
        assert!(h.is_empty());
        assert_eq!(h.rejected(), 2);
    }

    #[test]
    fn test_accurate_fix_is_admitted() {
        let mut h = history();
        assert!(h.observe(Position::new(35.0, 139.0), Some(50.0)));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_out_of_range_coordinates_dropped() {
        let mut h = history();
        assert!(!h.observe(Position::new(120.0, 139.0), Some(5.0)));
        assert!(h.is_empty());
    }

    #[test]
    fn test_fifo_eviction_after_overflow() {
        let mut h = history();
        let inputs: Vec<Position> = (0..101)
            .map(|i| Position::at(35.0 + i as f64 * 1e-5, 139.0, i as u64 * 1000))
            .collect();
        for p in &inputs {
            h.observe(*p, Some(10.0));
        }
        assert_eq!(h.len(), 100);
        assert_eq!(h.first(), Some(&inputs[1]));
        assert_eq!(h.latest(), Some(&inputs[100]));
    }

    #[test]
    fn test_last_two_ordering() {
        let mut h = history();
        assert!(h.last_two().is_none());
        let a = Position::at(35.0, 139.0, 0);
        let b = Position::at(35.0001, 139.0, 1000);
        h.observe(a, Some(5.0));
        h.observe(b, Some(5.0));
        assert_eq!(h.last_two(), Some((&a, &b)));
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut h = history();
        h.observe(Position::new(35.0, 139.0), Some(5.0));
        h.observe(Position::new(35.0, 139.0), Some(500.0));
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.rejected(), 0);
    }
}
