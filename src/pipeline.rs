//! Single-consumer session pipeline.
//!
//! This module owns the one thread of control that mutates a walking
//! session. Sensor feeds and user commands arrive as typed messages on one
//! FIFO channel, so every mutation happens strictly in arrival order.
//!
//! # Architecture
//!
//! 1. **Start**: subscribe the sensor sources, take the keep-awake handle,
//!    then start the session. A feed that cannot be subscribed becomes a
//!    status flag; the walk goes on without it.
//! 2. **Observe**: positions and accelerometer samples are applied to the
//!    session. Events stamped with a previous session's epoch are dropped.
//! 3. **Supervise**: while active, the loop waits with a bounded timeout so
//!    a silent geolocation feed is reported as timed out, and a session with
//!    no sensor activity at all is stopped automatically.
//! 4. **Stop**: unsubscribe every feed, finalize the summary, clear the
//!    session, then hand the summary to the sink.
//!
//! The loop ends on [`SessionCommand::Shutdown`] or once the last
//! [`PipelineHandle`] clone is dropped. Either way a live session is stopped
//! and its summary still reaches the sink.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::config::WalkConfig;
use crate::error::{DinoWalkError, Result, SensorError};
use crate::export::SessionSink;
use crate::sensors::{SensorEvent, SensorSender, SensorSource};
use crate::session::{Clock, SessionAggregate, SessionSummary, WalkingSession};
use crate::tracking::{KeepAwake, TrackingResources};
use crate::types::{SensorKind, SensorStatus};

/// Everything that travels on the pipeline's queue.
#[derive(Debug)]
pub enum PipelineMessage {
    /// A sensor delivery. `epoch` is `None` for events pushed directly
    /// through a [`PipelineHandle`], which apply to whatever session is live.
    Sensor {
        epoch: Option<u64>,
        event: SensorEvent,
    },
    Command(SessionCommand),
    /// The last [`PipelineHandle`] was dropped. Nothing can control the
    /// pipeline any more.
    HandlesDropped,
}

/// User-facing session controls.
#[derive(Debug)]
pub enum SessionCommand {
    Start,
    Stop,
    Reset,
    SetSensitivity(f32),
    AddSteps(u64),
    Snapshot(Sender<PipelineSnapshot>),
    Shutdown,
}

/// Point-in-time view of the pipeline, for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub active: bool,
    pub aggregate: SessionAggregate,
    pub sensitivity: f32,
    pub geolocation_status: SensorStatus,
    pub motion_status: SensorStatus,
    pub keep_awake_held: bool,
    pub sessions_completed: u64,
    pub last_summary: Option<SessionSummary>,
}

/// Cloneable control surface for a running pipeline.
///
/// Clones share one sender. Dropping the last clone ends the loop.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    shared: Arc<HandleShared>,
}

#[derive(Debug)]
struct HandleShared {
    tx: Sender<PipelineMessage>,
}

impl Drop for HandleShared {
    fn drop(&mut self) {
        // Fails harmlessly when the loop has already exited
        let _ = self.tx.send(PipelineMessage::HandlesDropped);
    }
}

impl PipelineHandle {
    fn new(tx: Sender<PipelineMessage>) -> Self {
        Self {
            shared: Arc::new(HandleShared { tx }),
        }
    }

    fn command(&self, command: SessionCommand) -> Result<()> {
        self.shared
            .tx
            .send(PipelineMessage::Command(command))
            .map_err(|_| DinoWalkError::PipelineClosed)
    }

    pub fn start(&self) -> Result<()> {
        self.command(SessionCommand::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.command(SessionCommand::Stop)
    }

    pub fn reset(&self) -> Result<()> {
        self.command(SessionCommand::Reset)
    }

    pub fn set_sensitivity(&self, sensitivity: f32) -> Result<()> {
        self.command(SessionCommand::SetSensitivity(sensitivity))
    }

    pub fn add_steps(&self, count: u64) -> Result<()> {
        self.command(SessionCommand::AddSteps(count))
    }

    /// Stop any live session and end the loop.
    pub fn shutdown(&self) -> Result<()> {
        self.command(SessionCommand::Shutdown)
    }

    /// Deliver a sensor event to whatever session is live.
    pub fn push_sensor(&self, event: SensorEvent) -> Result<()> {
        self.shared
            .tx
            .send(PipelineMessage::Sensor { epoch: None, event })
            .map_err(|_| DinoWalkError::PipelineClosed)
    }

    /// Ask for a snapshot. Waits until every earlier message is processed.
    pub fn snapshot(&self) -> Result<PipelineSnapshot> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.command(SessionCommand::Snapshot(reply_tx))?;
        reply_rx.recv().map_err(|_| DinoWalkError::PipelineClosed)
    }
}

/// The session event loop.
pub struct SessionPipeline {
    config: WalkConfig,
    session: WalkingSession,

    // Host resources
    sources: Vec<Box<dyn SensorSource>>,
    keep_awake: Option<Box<dyn KeepAwake>>,
    resources: Option<TrackingResources>,
    sink: Box<dyn SessionSink>,

    // Queue
    tx: Sender<PipelineMessage>,
    rx: Receiver<PipelineMessage>,

    // Supervision
    epoch: u64,
    started_at: Instant,
    last_fix_at: Option<Instant>,
    last_activity_at: Instant,

    // Statistics
    sessions_completed: u64,
    last_summary: Option<SessionSummary>,
}

impl SessionPipeline {
    /// Create a pipeline and the handle that controls it.
    pub fn new(config: WalkConfig, sink: Box<dyn SessionSink>) -> (Self, PipelineHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = PipelineHandle::new(tx.clone());
        let now = Instant::now();
        let pipeline = Self {
            session: WalkingSession::new(&config),
            config,
            sources: Vec::new(),
            keep_awake: None,
            resources: None,
            sink,
            tx,
            rx,
            epoch: 0,
            started_at: now,
            last_fix_at: None,
            last_activity_at: now,
            sessions_completed: 0,
            last_summary: None,
        };
        (pipeline, handle)
    }

    /// Use `clock` for session elapsed time instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.session = WalkingSession::with_clock(&self.config, clock);
        self
    }

    /// Subscribe `source` at the start of every session.
    pub fn with_source(mut self, source: Box<dyn SensorSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Hold `keep_awake` while a session runs (if enabled in config).
    pub fn with_keep_awake(mut self, keep_awake: Box<dyn KeepAwake>) -> Self {
        self.keep_awake = Some(keep_awake);
        self
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("dinowalk-pipeline".into())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// Process messages until [`SessionCommand::Shutdown`] or until every
    /// handle is gone.
    pub fn run(mut self) {
        info!("session pipeline running");
        loop {
            let received = match self.next_deadline() {
                Some(wait) => self.rx.recv_timeout(wait),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(PipelineMessage::Command(SessionCommand::Shutdown)) => break,
                Ok(PipelineMessage::HandlesDropped) => {
                    debug!("all pipeline handles dropped");
                    break;
                }
                Ok(PipelineMessage::Command(command)) => self.handle_command(command),
                Ok(PipelineMessage::Sensor { epoch, event }) => self.handle_sensor(epoch, event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.check_deadlines(Instant::now());
        }

        if self.session.is_active() {
            self.stop_session();
        }
        info!(
            "session pipeline stopped after {} sessions",
            self.sessions_completed
        );
    }

    // =========================================================================
    // MESSAGE HANDLING
    // =========================================================================

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start => self.start_session(),
            SessionCommand::Stop => self.stop_session(),
            SessionCommand::Reset => self.session.reset_session(),
            SessionCommand::SetSensitivity(value) => {
                if let Err(err) = self.session.set_sensitivity(value) {
                    warn!("ignoring sensitivity change: {}", err);
                }
            }
            SessionCommand::AddSteps(count) => self.session.add_manual_steps(count),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_sensor(&mut self, epoch: Option<u64>, event: SensorEvent) {
        let stale = epoch.is_some_and(|e| e != self.epoch);
        if !self.session.is_active() || stale {
            trace!("discarding {:?} event outside its session", event.kind());
            return;
        }

        let now = Instant::now();
        self.last_activity_at = now;

        match event {
            SensorEvent::Position(fix) => {
                if self.session.observe_position(&fix) {
                    self.last_fix_at = Some(now);
                }
            }
            SensorEvent::Acceleration(sample) => {
                if let Some(step) = self.session.observe_acceleration(&sample) {
                    trace!("step {} at {}ms", step.step_number, step.timestamp_ms);
                }
            }
            SensorEvent::GeolocationFailed { error } => {
                self.session
                    .report_sensor_error(SensorKind::Geolocation, error);
                if matches!(error, SensorError::PermissionDenied | SensorError::Unsupported) {
                    self.drop_feed(SensorKind::Geolocation);
                }
            }
            SensorEvent::MotionUnavailable { error } => {
                self.session.report_sensor_error(SensorKind::Motion, error);
                self.drop_feed(SensorKind::Motion);
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    fn start_session(&mut self) {
        if self.session.is_active() {
            warn!("start ignored: {}", DinoWalkError::SessionAlreadyActive);
            return;
        }

        self.epoch += 1;
        let sender = SensorSender::new(self.tx.clone(), self.epoch);
        let keep_awake = if self.config.tracking.keep_awake {
            self.keep_awake.take()
        } else {
            None
        };
        let (resources, failures) =
            TrackingResources::acquire(&mut self.sources, &sender, keep_awake);

        if let Err(err) = self.session.start_session() {
            warn!("start failed: {}", err);
            self.keep_awake = resources.release();
            return;
        }
        for failure in failures {
            self.session.report_sensor_error(failure.kind, failure.error);
        }

        let now = Instant::now();
        self.resources = Some(resources);
        self.started_at = now;
        self.last_fix_at = None;
        self.last_activity_at = now;
        debug!("session epoch {} started", self.epoch);
    }

    fn stop_session(&mut self) {
        if !self.session.is_active() {
            warn!("stop ignored: {}", DinoWalkError::SessionNotActive);
            return;
        }

        // Unsubscribe before anything is finalized or cleared
        if let Some(resources) = self.resources.take() {
            if let Some(handle) = resources.release() {
                self.keep_awake = Some(handle);
            }
        }
        self.epoch += 1;

        match self.session.stop_session() {
            Ok(summary) => {
                self.sessions_completed += 1;
                if let Err(err) = self.sink.session_finished(&summary) {
                    warn!("session summary was not recorded: {}", err);
                }
                self.last_summary = Some(summary);
            }
            Err(err) => warn!("stop failed: {}", err),
        }
    }

    fn drop_feed(&mut self, kind: SensorKind) {
        if let Some(resources) = self.resources.as_mut() {
            resources.drop_feed(kind);
        }
    }

    // =========================================================================
    // SUPERVISION
    // =========================================================================

    fn geolocation_deadline(&self) -> Option<Instant> {
        let watching = self
            .resources
            .as_ref()
            .map(|r| r.has_feed(SensorKind::Geolocation))
            .unwrap_or(false);
        let waiting = matches!(
            self.session.geolocation_status(),
            SensorStatus::Unknown | SensorStatus::Active
        );
        if !watching || !waiting {
            return None;
        }
        let since = self.last_fix_at.unwrap_or(self.started_at);
        Some(since + Duration::from_millis(self.config.tracking.geolocation_timeout_ms))
    }

    fn inactivity_deadline(&self) -> Instant {
        self.last_activity_at + Duration::from_millis(self.config.tracking.inactivity_timeout_ms)
    }

    /// How long the loop may block before a deadline needs checking.
    fn next_deadline(&self) -> Option<Duration> {
        if !self.session.is_active() {
            return None;
        }
        let mut deadline = self.inactivity_deadline();
        if let Some(geo) = self.geolocation_deadline() {
            deadline = deadline.min(geo);
        }
        Some(deadline.saturating_duration_since(Instant::now()))
    }

    fn check_deadlines(&mut self, now: Instant) {
        if !self.session.is_active() {
            return;
        }
        if now >= self.inactivity_deadline() {
            info!(
                "no sensor activity for {}ms, stopping session",
                self.config.tracking.inactivity_timeout_ms
            );
            self.stop_session();
            return;
        }
        if let Some(deadline) = self.geolocation_deadline() {
            if now >= deadline {
                self.session
                    .report_sensor_error(SensorKind::Geolocation, SensorError::Timeout);
            }
        }
    }

    fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            active: self.session.is_active(),
            aggregate: self.session.aggregate(),
            sensitivity: self.session.sensitivity(),
            geolocation_status: self.session.geolocation_status(),
            motion_status: self.session.motion_status(),
            keep_awake_held: self
                .resources
                .as_ref()
                .map(|r| r.keep_awake_held())
                .unwrap_or(false),
            sessions_completed: self.sessions_completed,
            last_summary: self.last_summary.clone(),
        }
    }
}
