//! Background tracking resources.
//!
//! Everything a live session holds on the host: one subscription per sensor
//! feed and, optionally, a keep-awake handle so the screen (and with it the
//! sensors) stays on while walking.
//!
//! - Acquisition is best-effort: a missing feed or a refused wake lock
//!   degrades the session, it never aborts it
//! - Release order is fixed: unsubscribe every feed first, then drop the
//!   keep-awake handle
//! - Dropping the guard releases anything still held

use log::{debug, warn};

use crate::error::SensorError;
use crate::sensors::{SensorSender, SensorSource, Subscription};
use crate::types::SensorKind;

/// A platform handle that keeps the device awake.
pub trait KeepAwake: Send {
    /// Take the handle. Failure is reported but not fatal.
    fn acquire(&mut self) -> Result<(), SensorError>;
    /// Give the handle back. Must be safe to call when not held.
    fn release(&mut self);
    fn is_held(&self) -> bool;
}

/// Keep-awake for hosts that have nothing to hold.
#[derive(Debug, Default)]
pub struct NoKeepAwake;

impl KeepAwake for NoKeepAwake {
    fn acquire(&mut self) -> Result<(), SensorError> {
        Err(SensorError::Unsupported)
    }

    fn release(&mut self) {}

    fn is_held(&self) -> bool {
        false
    }
}

/// A failed subscription, reported back to the session as a status flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeFailure {
    pub kind: SensorKind,
    pub error: SensorError,
}

/// Scoped ownership of everything a running session holds on the host.
pub struct TrackingResources {
    subscriptions: Vec<Subscription>,
    keep_awake: Option<Box<dyn KeepAwake>>,
}

impl TrackingResources {
    /// Subscribe every source and, if given, take the keep-awake handle.
    ///
    /// Returns the guard plus the feeds that could not be subscribed.
    pub fn acquire(
        sources: &mut [Box<dyn SensorSource>],
        sender: &SensorSender,
        keep_awake: Option<Box<dyn KeepAwake>>,
    ) -> (Self, Vec<SubscribeFailure>) {
        let mut subscriptions = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();

        for source in sources.iter_mut() {
            let kind = source.kind();
            match source.subscribe(sender.clone()) {
                Ok(subscription) => subscriptions.push(subscription),
                Err(error) => {
                    warn!("could not subscribe to {:?} feed: {}", kind, error);
                    failures.push(SubscribeFailure { kind, error });
                }
            }
        }

        let keep_awake = keep_awake.map(|mut handle| {
            if let Err(err) = handle.acquire() {
                // Walking still works with the screen off, just less reliably
                warn!("keep-awake unavailable: {}", err);
            }
            handle
        });

        debug!(
            "tracking resources acquired: {} feeds, keep-awake held: {}",
            subscriptions.len(),
            keep_awake.as_ref().map(|k| k.is_held()).unwrap_or(false)
        );

        (
            Self {
                subscriptions,
                keep_awake,
            },
            failures,
        )
    }

    /// Number of live subscriptions.
    pub fn active_feeds(&self) -> usize {
        self.subscriptions.len()
    }

    /// True when a subscription for `kind` is live.
    pub fn has_feed(&self, kind: SensorKind) -> bool {
        self.subscriptions.iter().any(|s| s.kind() == kind)
    }

    pub fn keep_awake_held(&self) -> bool {
        self.keep_awake.as_ref().map(|k| k.is_held()).unwrap_or(false)
    }

    /// Unsubscribe one feed (after permission was withdrawn mid-session).
    pub fn drop_feed(&mut self, kind: SensorKind) {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.subscriptions)
            .into_iter()
            .partition(|s| s.kind() == kind);
        self.subscriptions = kept;
        for subscription in gone {
            subscription.unsubscribe();
        }
    }

    /// Release everything: feeds first, then the keep-awake handle, which is
    /// returned so it can be reused by the next session.
    pub fn release(mut self) -> Option<Box<dyn KeepAwake>> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Option<Box<dyn KeepAwake>> {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        let mut handle = self.keep_awake.take()?;
        handle.release();
        Some(handle)
    }
}

impl Drop for TrackingResources {
    fn drop(&mut self) {
        self.release_inner();
    }
}
