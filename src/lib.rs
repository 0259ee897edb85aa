//! DinoWalk Motion Library
//!
//! Turns raw geolocation fixes and accelerometer readings into walking
//! progress: a debounced step count, a glitch-filtered distance, a current
//! speed, and the session summary that feeds a virtual dinosaur.
//!
//! # Design Philosophy
//!
//! - **One owner per walk**: a [`WalkingSession`] owns the step detector,
//!   the position history and the distance estimator. Nothing else mutates them.
//! - **Degrade, never abort**: a missing sensor or a refused permission turns
//!   into a status flag. The session keeps counting whatever it still has.
//! - **Bounded memory**: position history and the acceleration window are
//!   fixed-capacity buffers with FIFO eviction.
//! - **Ordered delivery**: the [`SessionPipeline`] processes sensor events and
//!   commands from one queue, on one thread, in arrival order.
//!
//! # Example
//!
//! ```
//! use dinowalk::{AccelerationSample, WalkConfig, WalkingSession};
//!
//! let mut session = WalkingSession::new(&WalkConfig::default());
//! session.start_session().unwrap();
//!
//! for i in 0..10 {
//!     session.observe_acceleration(&AccelerationSample::new(1000 + i * 20, 0.0, 0.0, 9.81));
//! }
//! let step = session.observe_acceleration(&AccelerationSample::new(1600, 0.0, 0.0, 30.0));
//! assert!(step.is_some());
//!
//! let summary = session.stop_session().unwrap();
//! assert_eq!(summary.steps, 1);
//! ```

pub mod config;
pub mod dinosaur;
pub mod distance;
pub mod error;
pub mod export;
pub mod geo;
pub mod pipeline;
pub mod position;
pub mod sensors;
pub mod session;
pub mod signal;
pub mod step_detection;
pub mod tracking;
pub mod types;


// Re-export commonly used types
pub use config::{TrackingConfig, WalkConfig};
pub use dinosaur::Dinosaur;
pub use error::{ConfigError, DinoWalkError, Result, SensorError};
pub use export::{JsonSink, MemorySink, NullSink, SessionSink};
pub use pipeline::{PipelineHandle, PipelineSnapshot, SessionPipeline};
pub use position::{PositionConfig, PositionHistory};
pub use sensors::{ReplaySource, SensorEvent, SensorSource, UnavailableSource};
pub use session::{
    Clock, ManualClock, SessionAggregate, SessionSummary, SystemClock, WalkingSession,
};
pub use step_detection::{StepDetector, StepDetectorConfig};
pub use tracking::{KeepAwake, NoKeepAwake};
pub use types::{
    AccelerationSample, CounterState, Position, PositionFix, SensorKind, SensorStatus, StepEvent,
};
