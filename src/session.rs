//! Walking session: lifecycle owner and aggregator.
//!
//! A [`WalkingSession`] exclusively owns the step detector, the position
//! history and the distance estimator for one walk. It is the only thing
//! that mutates them, and it exposes the combined, read-only view
//! ([`SessionAggregate`]) on demand. Nothing here is stored independently:
//! the aggregate is recomputed from its two sources every time.
//!
//! Lifecycle: `start_session` -> any number of observations -> `stop_session`,
//! which finalizes a [`SessionSummary`] and then discards all state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::WalkConfig;
use crate::dinosaur;
use crate::distance::DistanceEstimator;
use crate::error::{DinoWalkError, Result, SensorError};
use crate::geo;
use crate::position::{PositionConfig, PositionHistory};
use crate::step_detection::StepDetector;
use crate::types::{
    AccelerationSample, CounterState, Position, PositionFix, SensorKind, SensorStatus, StepEvent,
};

// ============================================================================
// CLOCK
// ============================================================================

/// Wall-clock source for elapsed-time accounting.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// The host's system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Live view of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionAggregate {
    pub steps: u64,
    /// Glitch-filtered distance over the retained history (meters).
    pub distance_m: f64,
    /// Speed over the last two positions (m/s).
    pub speed_mps: f64,
    /// Wall-clock time since the session started (ms).
    pub elapsed_ms: u64,
}

impl SessionAggregate {
    /// Experience this session is worth to the dinosaur.
    pub fn experience(&self) -> u64 {
        dinosaur::experience_for_steps(self.steps)
    }
}

/// Final record of a finished session, handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub steps: u64,
    pub distance_m: f64,
    /// Speed at the moment the session ended (m/s).
    pub final_speed_mps: f64,
    pub elapsed_ms: u64,
    pub experience_gained: u64,
    pub geolocation_status: SensorStatus,
    pub motion_status: SensorStatus,
}

impl SessionSummary {
    /// Mean speed over the whole session in m/s, 0 for an instant session.
    pub fn average_speed_mps(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.distance_m / (self.elapsed_ms as f64 / 1000.0)
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Owner of all per-walk state.
pub struct WalkingSession {
    clock: Arc<dyn Clock>,
    position_config: PositionConfig,

    detector: StepDetector,
    history: PositionHistory,
    estimator: DistanceEstimator,

    started_at_ms: Option<u64>,
    geolocation_status: SensorStatus,
    motion_status: SensorStatus,
}

impl WalkingSession {
    /// Create an idle session using the system clock.
    pub fn new(config: &WalkConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an idle session with an explicit clock.
    pub fn with_clock(config: &WalkConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            position_config: config.position.clone(),
            detector: StepDetector::new(config.step.clone()),
            history: PositionHistory::new(&config.position),
            estimator: DistanceEstimator::new(&config.position),
            started_at_ms: None,
            geolocation_status: SensorStatus::Unknown,
            motion_status: SensorStatus::Unknown,
        }
    }

    /// Begin a walk: fresh buffers, zero steps, clock started.
    pub fn start_session(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(DinoWalkError::SessionAlreadyActive);
        }
        self.clear_state();
        self.detector.start_counting();
        let now = self.clock.now_ms();
        self.started_at_ms = Some(now);
        info!("walking session started at {}", now);
        Ok(())
    }

    /// End the walk. Finalizes the summary before discarding any state.
    pub fn stop_session(&mut self) -> Result<SessionSummary> {
        let Some(started_at_ms) = self.started_at_ms else {
            return Err(DinoWalkError::SessionNotActive);
        };
        self.detector.stop_counting();

        let ended_at_ms = self.clock.now_ms().max(started_at_ms);
        let aggregate = self.aggregate();
        let summary = SessionSummary {
            started_at_ms,
            ended_at_ms,
            steps: aggregate.steps,
            distance_m: aggregate.distance_m,
            final_speed_mps: aggregate.speed_mps,
            elapsed_ms: ended_at_ms - started_at_ms,
            experience_gained: aggregate.experience(),
            geolocation_status: self.geolocation_status,
            motion_status: self.motion_status,
        };

        self.clear_state();
        self.started_at_ms = None;
        info!(
            "walking session stopped: {} steps, {} in {}s",
            summary.steps,
            geo::format_distance(summary.distance_m),
            summary.elapsed_ms / 1000
        );
        Ok(summary)
    }

    /// Zero steps and distance and clear every buffer. An active session
    /// stays active and its clock restarts.
    pub fn reset_session(&mut self) {
        self.detector.reset_steps();
        self.history.clear();
        self.estimator.reset();
        if self.started_at_ms.is_some() {
            self.started_at_ms = Some(self.clock.now_ms());
        }
        debug!("walking session reset");
    }

    /// Offer a geolocation fix. Returns true when it was admitted.
    ///
    /// Admitted fixes update the session distance while a session is active.
    pub fn observe_position(&mut self, fix: &PositionFix) -> bool {
        if !self.history.observe_fix(fix) {
            return false;
        }
        self.geolocation_status = SensorStatus::Active;
        if self.is_active() {
            self.estimator.update_session_distance(&mut self.history);
        }
        true
    }

    /// Offer an accelerometer sample. Returns the step it completed, if any.
    pub fn observe_acceleration(&mut self, sample: &AccelerationSample) -> Option<StepEvent> {
        if !self.is_active() {
            return None;
        }
        self.motion_status = SensorStatus::Active;
        self.detector.process_sample(sample)
    }

    /// Record a sensor failure as a status flag. Never fatal.
    pub fn report_sensor_error(&mut self, kind: SensorKind, error: SensorError) {
        let status = match error {
            SensorError::Unsupported | SensorError::Disconnected => SensorStatus::Unavailable,
            SensorError::PermissionDenied => SensorStatus::PermissionDenied,
            SensorError::Timeout => SensorStatus::TimedOut,
            // No sample this tick; the feed itself is fine
            SensorError::PositionUnavailable => return,
        };
        let slot = match kind {
            SensorKind::Geolocation => &mut self.geolocation_status,
            SensorKind::Motion => &mut self.motion_status,
        };
        if *slot != status {
            warn!("{:?} sensor status: {:?} ({})", kind, status, error);
            *slot = status;
        }
    }

    /// Change step detection sensitivity at runtime.
    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<()> {
        self.detector.set_sensitivity(sensitivity)?;
        Ok(())
    }

    /// Add steps entered by hand.
    pub fn add_manual_steps(&mut self, count: u64) {
        let now = self.clock.now_ms();
        self.detector.add_steps(count, now);
    }

    // =========================================================================
    // READ ACCESSORS
    // =========================================================================

    pub fn is_active(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn state(&self) -> CounterState {
        self.detector.state()
    }

    pub fn steps(&self) -> u64 {
        self.detector.steps()
    }

    pub fn distance_m(&self) -> f64 {
        self.estimator.session_distance()
    }

    pub fn speed_mps(&self) -> f64 {
        self.estimator.current_speed(&self.history)
    }

    /// Time since the session started, 0 when idle.
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at_ms
            .map(|start| self.clock.now_ms().saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn sensitivity(&self) -> f32 {
        self.detector.sensitivity()
    }

    pub fn geolocation_status(&self) -> SensorStatus {
        self.geolocation_status
    }

    pub fn motion_status(&self) -> SensorStatus {
        self.motion_status
    }

    /// Most recent admitted position.
    pub fn last_position(&self) -> Option<Position> {
        self.history.latest().copied()
    }

    /// The retained history, oldest first.
    pub fn positions(&self) -> Vec<Position> {
        self.history.to_vec()
    }

    /// The retained history with implausible hops removed.
    pub fn filtered_track(&self) -> Vec<Position> {
        geo::filter_positions_with(&self.history.to_vec(), &self.position_config)
    }

    /// True when the last two fixes are further apart than the moving threshold.
    pub fn is_moving(&self) -> bool {
        self.history
            .last_two()
            .map(|(a, b)| geo::is_moving(a, b, self.position_config.moving_threshold_m))
            .unwrap_or(false)
    }

    /// Combined view of steps, distance, speed and elapsed time.
    pub fn aggregate(&self) -> SessionAggregate {
        SessionAggregate {
            steps: self.steps(),
            distance_m: self.distance_m(),
            speed_mps: self.speed_mps(),
            elapsed_ms: self.elapsed_ms(),
        }
    }

    fn clear_state(&mut self) {
        self.detector.reset_steps();
        self.history.clear();
        self.estimator.reset();
        self.geolocation_status = SensorStatus::Unknown;
        self.motion_status = SensorStatus::Unknown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn session_at(start_ms: u64) -> (WalkingSession, ManualClock) {
        let clock = ManualClock::new(start_ms);
        let session = WalkingSession::with_clock(&WalkConfig::default(), Arc::new(clock.clone()));
        (session, clock)
    }

    fn fix(lat: f64, t: u64) -> PositionFix {
        PositionFix::new(Position::at(lat, 139.0, t), Some(8.0))
    }

    fn north(lat: f64, meters: f64) -> f64 {
        lat + (meters / geo::EARTH_RADIUS_M).to_degrees()
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let (mut session, clock) = session_at(1_000_000);
        assert!(!session.is_active());
        session.start_session().unwrap();
        assert!(session.is_active());
        assert_eq!(session.state(), CounterState::Counting);

        clock.advance(60_000);
        assert_eq!(session.elapsed_ms(), 60_000);

        let summary = session.stop_session().unwrap();
        assert_eq!(summary.started_at_ms, 1_000_000);
        assert_eq!(summary.ended_at_ms, 1_060_000);
        assert_eq!(summary.elapsed_ms, 60_000);
        assert!(!session.is_active());
        assert_eq!(session.elapsed_ms(), 0);
    }

    #[test]
    fn test_lifecycle_misuse_is_reported() {
        let (mut session, _) = session_at(0);
        assert!(matches!(
            session.stop_session(),
            Err(DinoWalkError::SessionNotActive)
        ));
        session.start_session().unwrap();
        assert!(matches!(
            session.start_session(),
            Err(DinoWalkError::SessionAlreadyActive)
        ));
    }

    #[test]
    fn test_distance_tracks_positions_while_active() {
        let (mut session, _) = session_at(0);
        session.start_session().unwrap();

        let mut lat = 35.0;
        for i in 0..4 {
            assert!(session.observe_position(&fix(lat, i * 10_000)));
            lat = north(lat, 12.0);
        }
        assert_relative_eq!(session.distance_m(), 36.0, epsilon = 1e-6);
        assert_relative_eq!(session.speed_mps(), 1.2, epsilon = 1e-6);
        assert_eq!(session.geolocation_status(), SensorStatus::Active);
    }

    #[test]
    fn test_idle_positions_do_not_accumulate_distance() {
        let (mut session, _) = session_at(0);
        session.observe_position(&fix(35.0, 0));
        session.observe_position(&fix(north(35.0, 20.0), 10_000));
        assert_eq!(session.distance_m(), 0.0);
        assert!(session.last_position().is_some());

        // Starting discards pre-session history
        session.start_session().unwrap();
        assert!(session.last_position().is_none());
    }

    #[test]
    fn test_inaccurate_fix_dropped_silently() {
        let (mut session, _) = session_at(0);
        session.start_session().unwrap();
        let noisy = PositionFix::new(Position::at(35.0, 139.0, 0), Some(80.0));
        assert!(!session.observe_position(&noisy));
        assert_eq!(session.geolocation_status(), SensorStatus::Unknown);
    }

    #[test]
    fn test_summary_finalized_before_clear() {
        let (mut session, clock) = session_at(0);
        session.start_session().unwrap();
        session.observe_position(&fix(35.0, 0));
        session.observe_position(&fix(north(35.0, 30.0), 20_000));
        session.add_manual_steps(42);
        clock.advance(20_000);

        let summary = session.stop_session().unwrap();
        assert_eq!(summary.steps, 42);
        assert_eq!(summary.experience_gained, 42);
        assert_relative_eq!(summary.distance_m, 30.0, epsilon = 1e-6);
        assert_relative_eq!(summary.average_speed_mps(), 1.5, epsilon = 1e-6);

        assert_eq!(session.steps(), 0);
        assert_eq!(session.distance_m(), 0.0);
        assert!(session.positions().is_empty());
    }

    #[test]
    fn test_reset_keeps_session_active() {
        let (mut session, clock) = session_at(0);
        session.start_session().unwrap();
        session.add_manual_steps(10);
        session.observe_position(&fix(35.0, 0));
        session.observe_position(&fix(north(35.0, 30.0), 20_000));
        clock.advance(5_000);

        session.reset_session();
        assert!(session.is_active());
        assert_eq!(session.steps(), 0);
        assert_eq!(session.distance_m(), 0.0);
        assert_eq!(session.elapsed_ms(), 0);
    }

    #[test]
    fn test_acceleration_ignored_when_idle() {
        let (mut session, _) = session_at(0);
        let spike = AccelerationSample::new(5_000, 0.0, 0.0, 30.0);
        assert!(session.observe_acceleration(&spike).is_none());
        assert_eq!(session.motion_status(), SensorStatus::Unknown);
    }

    #[test]
    fn test_sensor_errors_become_status_flags() {
        let (mut session, _) = session_at(0);
        session.start_session().unwrap();
        session.report_sensor_error(SensorKind::Motion, SensorError::Unsupported);
        session.report_sensor_error(SensorKind::Geolocation, SensorError::PermissionDenied);
        assert_eq!(session.motion_status(), SensorStatus::Unavailable);
        assert_eq!(session.geolocation_status(), SensorStatus::PermissionDenied);

        session.report_sensor_error(SensorKind::Geolocation, SensorError::PositionUnavailable);
        assert_eq!(session.geolocation_status(), SensorStatus::PermissionDenied);
        assert!(session.is_active());
    }

    #[test]
    fn test_aggregate_and_movement() {
        let (mut session, clock) = session_at(0);
        session.start_session().unwrap();
        session.observe_position(&fix(35.0, 0));
        session.observe_position(&fix(north(35.0, 3.0), 2_000));
        assert!(!session.is_moving());
        session.observe_position(&fix(north(north(35.0, 3.0), 8.0), 6_000));
        assert!(session.is_moving());
        clock.advance(6_000);

        let aggregate = session.aggregate();
        assert_eq!(aggregate.elapsed_ms, 6_000);
        assert_relative_eq!(aggregate.distance_m, 11.0, epsilon = 1e-6);
        assert_relative_eq!(aggregate.speed_mps, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_filtered_track_drops_glitch() {
        let (mut session, _) = session_at(0);
        session.start_session().unwrap();
        session.observe_position(&fix(35.0, 0));
        session.observe_position(&fix(north(35.0, 1500.0), 10_000));
        session.observe_position(&fix(north(35.0, 10.0), 10_000));
        let track = session.filtered_track();
        assert_eq!(track.len(), 2);
        assert_eq!(session.positions().len(), 3);
    }
}
