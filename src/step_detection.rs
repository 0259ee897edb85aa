//! Step Detection Module.
//!
//! Counts steps from a stream of raw accelerometer samples (gravity
//! included) using:
//! - A moving-average magnitude baseline over a short sliding window
//! - Peak detection against an adaptive threshold (baseline + sensitivity)
//! - A debounce interval between accepted peaks
//! - A hysteresis band that re-arms detection once the signal dips
//!   below baseline - sensitivity / 2
//! - A timeout that re-arms detection after a long pause
//!
//! The thresholds are empirical defaults, not constants: every one of them
//! lives in [`StepDetectorConfig`] and sensitivity can be changed at runtime.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::signal::AccelerationWindow;
use crate::types::{AccelerationSample, CounterState, StepEvent};

/// Configuration for step detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDetectorConfig {
    /// Number of samples in the moving-average window. No peak is evaluated
    /// until the window is full.
    pub window_size: usize,
    /// Minimum time between accepted peaks in milliseconds (debounce).
    pub min_step_interval_ms: u64,
    /// Gap after which the peak latch is forced open again (milliseconds).
    pub max_step_interval_ms: u64,
    /// Height above the baseline a sample must reach to count (m/s²).
    pub sensitivity: f32,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_step_interval_ms: 300,  // ~3.3 steps/sec ceiling
            max_step_interval_ms: 2000, // Slower than this is not one stride
            sensitivity: 10.0,
        }
    }
}

/// Check a sensitivity value before it reaches the detector.
pub(crate) fn validate_sensitivity(value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(
            "sensitivity",
            format!("must be a positive finite number, got {value}"),
        ));
    }
    Ok(())
}

/// Peak-detecting step counter.
///
/// Idle until [`start_counting`](Self::start_counting); samples delivered
/// while idle are ignored.
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: StepDetectorConfig,
    state: CounterState,

    // Baseline
    window: AccelerationWindow,

    // Peak tracking
    last_peak_time_ms: u64,
    peak_latched: bool,

    // Counting
    steps: u64,
    last_step_time_ms: Option<u64>,

    // Statistics
    samples_seen: u64,
    malformed_samples: u64,
}

impl StepDetector {
    /// Create a new, idle step detector.
    pub fn new(config: StepDetectorConfig) -> Self {
        Self {
            window: AccelerationWindow::new(config.window_size),
            config,
            state: CounterState::Idle,
            last_peak_time_ms: 0,
            peak_latched: false,
            steps: 0,
            last_step_time_ms: None,
            samples_seen: 0,
            malformed_samples: 0,
        }
    }

    /// Create a step detector with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StepDetectorConfig::default())
    }

    /// Begin counting. Clears the window and peak tracking, keeps the count.
    pub fn start_counting(&mut self) {
        self.clear_tracking();
        self.state = CounterState::Counting;
        debug!("step counting started at {} steps", self.steps);
    }

    /// Stop counting. The count is kept until [`reset_steps`](Self::reset_steps).
    pub fn stop_counting(&mut self) {
        self.state = CounterState::Idle;
        debug!("step counting stopped at {} steps", self.steps);
    }

    /// Zero the count and clear all peak-tracking state, whether or not
    /// counting is active.
    pub fn reset_steps(&mut self) {
        self.steps = 0;
        self.last_step_time_ms = None;
        self.clear_tracking();
    }

    /// Change the detection threshold at runtime.
    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<(), ConfigError> {
        validate_sensitivity(sensitivity)?;
        info!(
            "step sensitivity changed from {} to {}",
            self.config.sensitivity, sensitivity
        );
        self.config.sensitivity = sensitivity;
        Ok(())
    }

    /// Add steps by hand (manual entry). Does not touch peak tracking.
    pub fn add_steps(&mut self, count: u64, timestamp_ms: u64) {
        if count == 0 {
            return;
        }
        self.steps += count;
        self.last_step_time_ms = Some(timestamp_ms);
    }

    /// Process one accelerometer sample.
    ///
    /// Returns a [`StepEvent`] if this sample completed a step.
    pub fn process_sample(&mut self, sample: &AccelerationSample) -> Option<StepEvent> {
        if self.state != CounterState::Counting {
            return None;
        }
        if !sample.is_well_formed() {
            self.malformed_samples += 1;
            return None;
        }
        self.samples_seen += 1;

        let magnitude = self.window.push(sample);

        // Warm-up: the baseline is meaningless until the window is full
        if !self.window.is_full() {
            return None;
        }

        let baseline = self.window.average();
        if self.detect_peak(magnitude, baseline, sample.timestamp_ms) {
            self.steps += 1;
            self.last_step_time_ms = Some(sample.timestamp_ms);
            return Some(StepEvent::new(
                sample.timestamp_ms,
                self.steps,
                magnitude,
                baseline,
            ));
        }

        None
    }

    /// Process a batch of samples and return all detected steps.
    pub fn process_batch(&mut self, samples: &[AccelerationSample]) -> Vec<StepEvent> {
        samples
            .iter()
            .filter_map(|sample| self.process_sample(sample))
            .collect()
    }

    /// Total steps counted.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn state(&self) -> CounterState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == CounterState::Counting
    }

    pub fn sensitivity(&self) -> f32 {
        self.config.sensitivity
    }

    pub fn config(&self) -> &StepDetectorConfig {
        &self.config
    }

    /// Timestamp of the most recent step, if any.
    pub fn last_step_time(&self) -> Option<u64> {
        self.last_step_time_ms
    }

    /// Current moving-average baseline (0 while the window is empty).
    pub fn baseline(&self) -> f32 {
        self.window.average()
    }

    /// True when enough samples have arrived to evaluate peaks.
    pub fn is_warmed_up(&self) -> bool {
        self.window.is_full()
    }

    /// Samples rejected for non-finite axis values.
    pub fn malformed_samples(&self) -> u64 {
        self.malformed_samples
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn clear_tracking(&mut self) {
        self.window.clear();
        self.last_peak_time_ms = 0;
        self.peak_latched = false;
    }

    fn detect_peak(&mut self, magnitude: f32, baseline: f32, timestamp_ms: u64) -> bool {
        let threshold = self.config.sensitivity;
        let since_last_peak = timestamp_ms.saturating_sub(self.last_peak_time_ms);

        // A long gap means no step is in progress
        if since_last_peak > self.config.max_step_interval_ms {
            self.peak_latched = false;
        }

        let above_threshold = magnitude > baseline + threshold;
        let debounced = since_last_peak > self.config.min_step_interval_ms;

        if above_threshold && debounced && !self.peak_latched {
            self.peak_latched = true;
            self.last_peak_time_ms = timestamp_ms;
            return true;
        }

        // Re-arm once the signal falls through the lower hysteresis band
        if magnitude < baseline - threshold / 2.0 {
            self.peak_latched = false;
        }

        false
    }
}

// ============================================================================
// TESTS
// ============================================================================
