//! Error taxonomy for the walking engine.
//!
//! Nothing in the estimation core is fatal. Sensor failures are surfaced as
//! status flags, low-quality samples are dropped, and degenerate numerics
//! resolve to zero. The variants below exist for the edges of the system:
//! lifecycle misuse, configuration loading, sensor subscription and the
//! hand-off of finished sessions.

use thiserror::Error;

/// Failure reported by a sensor feed (geolocation or motion).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SensorError {
    /// The host has no such capability.
    #[error("sensor is not supported on this host")]
    Unsupported,
    /// The user refused access to the sensor.
    #[error("permission to use the sensor was denied")]
    PermissionDenied,
    /// No reading arrived within the bounded wait.
    #[error("timed out waiting for a sensor reading")]
    Timeout,
    /// The sensor is present but could not produce a position.
    #[error("position is currently unavailable")]
    PositionUnavailable,
    /// The event channel was closed underneath the source.
    #[error("sensor channel disconnected")]
    Disconnected,
}

/// Failure while loading or validating a [`crate::config::WalkConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Top-level error type for the crate.
#[derive(Error, Debug)]
pub enum DinoWalkError {
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no walking session is active")]
    SessionNotActive,
    #[error("a walking session is already active")]
    SessionAlreadyActive,
    #[error("session sink failed: {0}")]
    Sink(String),
    #[error("pipeline is no longer running")]
    PipelineClosed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, DinoWalkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_names_field() {
        let err = ConfigError::invalid("sensitivity", "must be positive");
        let msg = err.to_string();
        assert!(msg.contains("sensitivity"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_sensor_error_wraps_transparently() {
        let err: DinoWalkError = SensorError::PermissionDenied.into();
        assert_eq!(err.to_string(), SensorError::PermissionDenied.to_string());
        assert!(matches!(err, DinoWalkError::Sensor(SensorError::PermissionDenied)));
    }
}
