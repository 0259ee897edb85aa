//! Engine configuration.
//!
//! Bundles every sub-component configuration into one serde document so a
//! deployment can tune thresholds without recompiling. Every field has a
//! default; a partial JSON document only overrides what it names.
//!
//! ```
//! use dinowalk::config::WalkConfig;
//!
//! let config = WalkConfig::from_json_str(r#"{ "step": { "sensitivity": 12.0 } }"#).unwrap();
//! assert_eq!(config.step.sensitivity, 12.0);
//! assert_eq!(config.step.window_size, 10);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::position::PositionConfig;
use crate::step_detection::{validate_sensitivity, StepDetectorConfig};

/// Timing for the background tracking loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Bounded wait for a geolocation fix before reporting a timeout (ms).
    pub geolocation_timeout_ms: u64,
    /// Stop an active session after this long without any sensor event (ms).
    pub inactivity_timeout_ms: u64,
    /// Hold a keep-awake handle while a session is active.
    pub keep_awake: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            geolocation_timeout_ms: 10_000,
            inactivity_timeout_ms: 30 * 60 * 1000,
            keep_awake: true,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub step: StepDetectorConfig,
    pub position: PositionConfig,
    pub tracking: TrackingConfig,
}

impl WalkConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WalkConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject values the estimators cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let step = &self.step;
        if step.window_size == 0 {
            return Err(ConfigError::invalid("step.window_size", "must be at least 1"));
        }
        if step.min_step_interval_ms >= step.max_step_interval_ms {
            return Err(ConfigError::invalid(
                "step.min_step_interval_ms",
                format!(
                    "must be below max_step_interval_ms ({} >= {})",
                    step.min_step_interval_ms, step.max_step_interval_ms
                ),
            ));
        }
        validate_sensitivity(step.sensitivity)?;

        let position = &self.position;
        if position.history_capacity < 2 {
            return Err(ConfigError::invalid(
                "position.history_capacity",
                "must hold at least two positions",
            ));
        }
        if !(position.max_accuracy_m > 0.0) {
            return Err(ConfigError::invalid("position.max_accuracy_m", "must be positive"));
        }
        if !(position.max_jump_m > 0.0) {
            return Err(ConfigError::invalid("position.max_jump_m", "must be positive"));
        }
        if !(position.min_walking_speed_mps >= 0.0
            && position.min_walking_speed_mps <= position.max_walking_speed_mps)
        {
            return Err(ConfigError::invalid(
                "position.min_walking_speed_mps",
                "walking speed band must be non-negative and ordered",
            ));
        }

        if self.tracking.geolocation_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "tracking.geolocation_timeout_ms",
                "must be positive",
            ));
        }
        if self.tracking.inactivity_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "tracking.inactivity_timeout_ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}
