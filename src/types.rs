//! Core data types for the walking engine.
//!
//! This module defines the sensor inputs and derived events used throughout
//! the step and distance pipeline. Inputs are immutable once recorded; the
//! engine never edits a sample, it only admits or drops it.
//!
//! Design principle: if a concept exists, it gets a type. Sensor feeds never
//! cross a boundary as raw tuples.

use serde::{Deserialize, Serialize};

// ============================================================================
// GEOLOCATION TYPES
// ============================================================================

/// A geolocation sample in degrees.
///
/// Has no identity beyond its place in an ordered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Milliseconds since the Unix epoch, when the host reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
}

impl Position {
    /// Create a position without a timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms: None,
        }
    }

    /// Create a position stamped with the time it was taken.
    pub fn at(latitude: f64, longitude: f64, timestamp_ms: u64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms: Some(timestamp_ms),
        }
    }

    /// Check that both coordinates are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A raw update from the geolocation feed: the position plus the radius of
/// uncertainty the host attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub position: Position,
    /// Accuracy radius in meters. `None` when the host did not report one.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

impl PositionFix {
    pub fn new(position: Position, accuracy_m: Option<f64>) -> Self {
        Self {
            position,
            accuracy_m,
        }
    }
}

// ============================================================================
// MOTION TYPES
// ============================================================================

/// A single three-axis accelerometer reading, gravity included.
///
/// f32 is plenty for peak detection and halves the footprint of the
/// sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    /// Milliseconds, monotonic within a session.
    pub timestamp_ms: u64,
    /// Acceleration [x, y, z] in m/s².
    pub accel: [f32; 3],
}

impl AccelerationSample {
    pub fn new(timestamp_ms: u64, x: f32, y: f32, z: f32) -> Self {
        Self {
            timestamp_ms,
            accel: [x, y, z],
        }
    }

    /// Magnitude of the acceleration vector in m/s².
    ///
    /// Squares are summed in f64; the result is infinite only when the
    /// magnitude itself does not fit in an f32.
    pub fn magnitude(&self) -> f32 {
        let squares: f64 = self.accel.iter().map(|&v| (v as f64) * (v as f64)).sum();
        squares.sqrt() as f32
    }

    /// True when every axis and the resulting magnitude are finite.
    pub fn is_well_formed(&self) -> bool {
        self.accel.iter().all(|v| v.is_finite()) && self.magnitude().is_finite()
    }
}

// ============================================================================
// STEP TYPES
// ============================================================================

/// A detected step from accelerometer peak detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Timestamp of the sample that crossed the threshold.
    pub timestamp_ms: u64,
    /// Running step count after this step.
    pub step_number: u64,
    /// Magnitude of the triggering sample (m/s²).
    pub magnitude: f32,
    /// Moving-average baseline at the moment of detection (m/s²).
    pub baseline: f32,
}

impl StepEvent {
    pub fn new(timestamp_ms: u64, step_number: u64, magnitude: f32, baseline: f32) -> Self {
        Self {
            timestamp_ms,
            step_number,
            magnitude,
            baseline,
        }
    }
}

/// Whether a step counter or session is currently consuming samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterState {
    /// Not counting. Samples are ignored.
    #[default]
    Idle,
    /// Active and buffering samples.
    Counting,
}

// ============================================================================
// SENSOR STATUS TYPES
// ============================================================================

/// The two sensor feeds the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Geolocation,
    Motion,
}

/// Health of a sensor feed as last observed.
///
/// Every state is recoverable by stopping and starting a session again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    /// No reading or failure observed yet.
    #[default]
    Unknown,
    /// Readings are arriving.
    Active,
    /// The host lacks the capability. Feature silently disabled.
    Unavailable,
    /// Access refused. No further attempts until the user re-authorizes.
    PermissionDenied,
    /// No reading within the bounded wait.
    TimedOut,
}

impl SensorStatus {
    /// True when the feed can still deliver samples this session.
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            SensorStatus::Unknown | SensorStatus::Active | SensorStatus::TimedOut
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceleration_magnitude() {
        let sample = AccelerationSample::new(0, 3.0, 4.0, 0.0);
        assert_eq!(sample.magnitude(), 5.0);
    }

    #[test]
    fn test_malformed_sample_detected() {
        let sample = AccelerationSample::new(0, f32::NAN, 0.0, 9.81);
        assert!(!sample.is_well_formed());
        assert!(AccelerationSample::new(0, 0.0, 0.0, 9.81).is_well_formed());
    }

    #[test]
    fn test_magnitude_overflow_is_malformed() {
        let huge = AccelerationSample::new(0, 1e20, 0.0, 0.0);
        assert!(huge.is_well_formed());
        assert_eq!(huge.magnitude(), 1e20);

        let overflow = AccelerationSample::new(0, f32::MAX, f32::MAX, 0.0);
        assert!(!overflow.is_well_formed());
    }

    #[test]
    fn test_position_validity() {
        assert!(Position::new(35.6812, 139.7671).is_valid());
        assert!(!Position::new(91.0, 0.0).is_valid());
        assert!(!Position::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_position_timestamp_omitted_in_json() {
        let json = serde_json::to_string(&Position::new(1.0, 2.0)).unwrap();
        assert!(!json.contains("timestamp_ms"));
        let back: Position = serde_json::from_str(r#"{"latitude":1.0,"longitude":2.0}"#).unwrap();
        assert_eq!(back.timestamp_ms, None);
    }

    #[test]
    fn test_sensor_status_usability() {
        assert!(SensorStatus::Active.is_usable());
        assert!(SensorStatus::TimedOut.is_usable());
        assert!(!SensorStatus::PermissionDenied.is_usable());
        assert!(!SensorStatus::Unavailable.is_usable());
    }
}
