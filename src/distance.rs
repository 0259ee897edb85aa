//! Session distance and speed estimation.
//!
//! The estimator recomputes the session total from the current history
//! snapshot on every accepted fix. History is bounded, so this is O(100)
//! at worst and keeps the glitch-exclusion policy identical to
//! [`geo::total_distance`].

use log::debug;

use crate::geo;
use crate::position::{PositionConfig, PositionHistory};

/// Running distance for the active session.
#[derive(Debug, Clone)]
pub struct DistanceEstimator {
    max_jump_m: f64,
    session_distance_m: f64,
    updates: u64,
}

impl DistanceEstimator {
    pub fn new(config: &PositionConfig) -> Self {
        Self {
            max_jump_m: config.max_jump_m,
            session_distance_m: 0.0,
            updates: 0,
        }
    }

    /// Recompute the session distance from the history snapshot.
    ///
    /// Idempotent for an unchanged history.
    pub fn update_session_distance(&mut self, history: &mut PositionHistory) -> f64 {
        let total = geo::total_distance_with_limit(history.as_slice(), self.max_jump_m);
        if total < self.session_distance_m {
            // Eviction dropped the oldest hop out of the window.
            debug!(
                "session distance shrank from {:.1}m to {:.1}m after eviction",
                self.session_distance_m, total
            );
        }
        self.session_distance_m = total;
        self.updates += 1;
        total
    }

    /// Instantaneous speed from the two most recent positions, in m/s.
    ///
    /// Returns 0 with fewer than two positions.
    pub fn current_speed(&self, history: &PositionHistory) -> f64 {
        history
            .last_two()
            .map(|(prev, latest)| geo::speed(prev, latest))
            .unwrap_or(0.0)
    }

    /// Last computed session distance in meters.
    pub fn session_distance(&self) -> f64 {
        self.session_distance_m
    }

    /// Number of recomputations since the last reset.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn reset(&mut self) {
        self.session_distance_m = 0.0;
        self.updates = 0;
    }
}
