//! Sensor feeds as typed messages.
//!
//! Host sensor callbacks (geolocation updates, device-motion events) are
//! modelled as [`SensorEvent`] values pushed into the pipeline's single
//! queue. A [`SensorSource`] is anything that can start delivering those
//! events; subscribing returns a [`Subscription`] whose drop stops delivery
//! before it returns, so no callback can land after the session that asked
//! for it has been torn down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::pipeline::PipelineMessage;
use crate::types::{AccelerationSample, PositionFix, SensorKind};

/// One delivery from a sensor feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorEvent {
    /// A geolocation update.
    Position(PositionFix),
    /// An accelerometer reading, gravity included.
    Acceleration(AccelerationSample),
    /// The geolocation feed reported an error instead of a fix.
    GeolocationFailed { error: SensorError },
    /// Motion sensing is unavailable or was refused.
    MotionUnavailable { error: SensorError },
}

impl SensorEvent {
    /// The feed this event belongs to.
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorEvent::Position(_) | SensorEvent::GeolocationFailed { .. } => {
                SensorKind::Geolocation
            }
            SensorEvent::Acceleration(_) | SensorEvent::MotionUnavailable { .. } => {
                SensorKind::Motion
            }
        }
    }
}

/// Sending half handed to a sensor source.
///
/// Every event is stamped with the session epoch the subscription was made
/// for; the pipeline discards events from any other epoch.
#[derive(Debug, Clone)]
pub struct SensorSender {
    tx: Sender<PipelineMessage>,
    epoch: u64,
}

impl SensorSender {
    pub(crate) fn new(tx: Sender<PipelineMessage>, epoch: u64) -> Self {
        Self { tx, epoch }
    }

    /// Deliver one event. Fails only when the pipeline has gone away.
    pub fn send(&self, event: SensorEvent) -> Result<(), SensorError> {
        self.tx
            .send(PipelineMessage::Sensor {
                epoch: Some(self.epoch),
                event,
            })
            .map_err(|_| SensorError::Disconnected)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// A host sensor that can be subscribed to.
pub trait SensorSource: Send {
    /// Which feed this source provides.
    fn kind(&self) -> SensorKind;

    /// Start delivering events to `tx`.
    ///
    /// An error means the capability is missing or refused; the pipeline
    /// turns it into a status flag and carries on without this feed.
    fn subscribe(&mut self, tx: SensorSender) -> Result<Subscription, SensorError>;
}

/// Live registration with a sensor source. Dropping it unsubscribes.
pub struct Subscription {
    kind: SensorKind,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a cancel action. It must not return until delivery has stopped.
    pub fn new(kind: SensorKind, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            kind,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Stop delivery now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
            debug!("unsubscribed from {:?} feed", self.kind);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ============================================================================
// REPLAY SOURCE
// ============================================================================

/// Plays back a recorded list of events on a background thread.
///
/// Used by the CLI and by tests in place of real hardware. Events whose
/// feed differs from the source's kind are still delivered, so a single
/// replay can carry a whole mixed recording.
pub struct ReplaySource {
    kind: SensorKind,
    events: Vec<SensorEvent>,
    pace: Option<Duration>,
    done_tx: Option<Sender<usize>>,
}

impl ReplaySource {
    pub fn new(kind: SensorKind, events: Vec<SensorEvent>) -> Self {
        Self {
            kind,
            events,
            pace: None,
            done_tx: None,
        }
    }

    /// Like [`new`](Self::new), plus a receiver that yields the number of
    /// events sent once playback finishes or is cancelled.
    pub fn with_completion(kind: SensorKind, events: Vec<SensorEvent>) -> (Self, Receiver<usize>) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let mut source = Self::new(kind, events);
        source.done_tx = Some(done_tx);
        (source, done_rx)
    }

    /// Split a mixed recording into one source per feed, keeping each feed's
    /// order. Feeds with no events get no source.
    ///
    /// Each feed can then be unsubscribed on its own (a refused geolocation
    /// permission must not cut off the accelerometer).
    pub fn per_feed(events: Vec<SensorEvent>) -> Vec<(Self, Receiver<usize>)> {
        let (geolocation, motion): (Vec<_>, Vec<_>) = events
            .into_iter()
            .partition(|event| event.kind() == SensorKind::Geolocation);

        [(SensorKind::Geolocation, geolocation), (SensorKind::Motion, motion)]
            .into_iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(kind, events)| Self::with_completion(kind, events))
            .collect()
    }

    /// Sleep between events instead of sending them back to back.
    pub fn paced(mut self, interval: Duration) -> Self {
        self.pace = Some(interval);
        self
    }
}

impl SensorSource for ReplaySource {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn subscribe(&mut self, tx: SensorSender) -> Result<Subscription, SensorError> {
        let events = std::mem::take(&mut self.events);
        let pace = self.pace;
        let done_tx = self.done_tx.take();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let worker: JoinHandle<()> = thread::Builder::new()
            .name(format!("replay-{:?}", self.kind).to_lowercase())
            .spawn(move || {
                let mut sent = 0;
                for event in events {
                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    if tx.send(event).is_err() {
                        break;
                    }
                    sent += 1;
                    if let Some(interval) = pace {
                        thread::sleep(interval);
                    }
                }
                trace!("replay finished after {} events", sent);
                if let Some(done) = done_tx {
                    let _ = done.send(sent);
                }
            })
            .map_err(|_| SensorError::Unsupported)?;

        Ok(Subscription::new(self.kind, move || {
            stop.store(true, Ordering::SeqCst);
            let _ = worker.join();
        }))
    }
}

/// A source whose capability is missing or refused.
///
/// Models hosts without a motion API or users who decline permission.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableSource {
    kind: SensorKind,
    error: SensorError,
}

impl UnavailableSource {
    pub fn new(kind: SensorKind, error: SensorError) -> Self {
        Self { kind, error }
    }
}

impl SensorSource for UnavailableSource {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn subscribe(&mut self, _tx: SensorSender) -> Result<Subscription, SensorError> {
        Err(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    #[test]
    fn test_event_kind() {
        let fix = PositionFix::new(Position::new(35.0, 139.0), Some(5.0));
        assert_eq!(SensorEvent::Position(fix).kind(), SensorKind::Geolocation);
        let accel = AccelerationSample::new(0, 0.0, 0.0, 9.81);
        assert_eq!(SensorEvent::Acceleration(accel).kind(), SensorKind::Motion);
        let failed = SensorEvent::MotionUnavailable {
            error: SensorError::Unsupported,
        };
        assert_eq!(failed.kind(), SensorKind::Motion);
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"[
            {"type":"position","accuracy_m":12.0,
             "position":{"latitude":35.0,"longitude":139.0,"timestamp_ms":1000}},
            {"type":"acceleration","timestamp_ms":1000,"accel":[0.0,0.0,9.81]},
            {"type":"geolocation_failed","error":"Timeout"}
        ]"#;
        let events: Vec<SensorEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SensorEvent::Position(f) if f.accuracy_m == Some(12.0)));
        assert!(matches!(
            events[2],
            SensorEvent::GeolocationFailed { error: SensorError::Timeout }
        ));
    }

    #[test]
    fn test_replay_delivers_in_order_and_signals_completion() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let events: Vec<SensorEvent> = (0..5)
            .map(|i| SensorEvent::Acceleration(AccelerationSample::new(i, 0.0, 0.0, 9.81)))
            .collect();
        let (mut source, done) = ReplaySource::with_completion(SensorKind::Motion, events);

        let subscription = source.subscribe(SensorSender::new(tx, 7)).unwrap();
        assert_eq!(done.recv().unwrap(), 5);
        subscription.unsubscribe();

        let received: Vec<u64> = rx
            .try_iter()
            .map(|msg| match msg {
                PipelineMessage::Sensor {
                    epoch,
                    event: SensorEvent::Acceleration(s),
                } => {
                    assert_eq!(epoch, Some(7));
                    s.timestamp_ms
                }
                other => panic!("unexpected message {:?}", other),
            })
            .collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_per_feed_split_keeps_order_within_feed() {
        let fix = |t| {
            SensorEvent::Position(PositionFix::new(Position::at(35.0, 139.0, t), Some(5.0)))
        };
        let accel = |t| SensorEvent::Acceleration(AccelerationSample::new(t, 0.0, 0.0, 9.81));
        let events = vec![
            SensorEvent::GeolocationFailed {
                error: SensorError::PermissionDenied,
            },
            accel(0),
            fix(10),
            accel(20),
            accel(40),
        ];

        let sources = ReplaySource::per_feed(events);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].0.kind(), SensorKind::Geolocation);
        assert_eq!(sources[0].0.events.len(), 2);
        assert_eq!(sources[1].0.kind(), SensorKind::Motion);
        let motion_times: Vec<u64> = sources[1]
            .0
            .events
            .iter()
            .map(|e| match e {
                SensorEvent::Acceleration(s) => s.timestamp_ms,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(motion_times, vec![0, 20, 40]);

        let accel_only = ReplaySource::per_feed(vec![accel(0)]);
        assert_eq!(accel_only.len(), 1);
        assert_eq!(accel_only[0].0.kind(), SensorKind::Motion);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let events: Vec<SensorEvent> = (0..1000)
            .map(|i| SensorEvent::Acceleration(AccelerationSample::new(i, 0.0, 0.0, 9.81)))
            .collect();
        let mut source =
            ReplaySource::new(SensorKind::Motion, events).paced(Duration::from_millis(1));

        let subscription = source.subscribe(SensorSender::new(tx, 1)).unwrap();
        thread::sleep(Duration::from_millis(10));
        subscription.unsubscribe();

        let delivered = rx.try_iter().count();
        thread::sleep(Duration::from_millis(10));
        assert!(delivered < 1000);
        assert_eq!(rx.try_iter().count(), 0, "no events after unsubscribe");
    }

    #[test]
    fn test_unavailable_source_refuses() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut source = UnavailableSource::new(SensorKind::Motion, SensorError::PermissionDenied);
        let err = source.subscribe(SensorSender::new(tx, 0)).unwrap_err();
        assert_eq!(err, SensorError::PermissionDenied);
    }
}
