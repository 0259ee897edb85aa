//! Session hand-off.
//!
//! When a walk ends, its [`SessionSummary`] is handed to a [`SessionSink`]
//! (the user-record store in production). The core does not persist
//! anything itself, and a failing sink never takes a session down with it.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{DinoWalkError, Result};
use crate::session::SessionSummary;

/// Receiver of finished sessions.
pub trait SessionSink: Send {
    fn session_finished(&mut self, summary: &SessionSummary) -> Result<()>;
}

/// Writes one JSON object per finished session, newline separated.
pub struct JsonSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> SessionSink for JsonSink<W> {
    fn session_finished(&mut self, summary: &SessionSummary) -> Result<()> {
        serde_json::to_writer(&mut self.writer, summary)
            .map_err(|e| DinoWalkError::Sink(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps finished sessions in memory. Clones share the same store.
///
/// A clone that panicked while holding the lock does not hide or block the
/// sessions already recorded.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    sessions: Arc<Mutex<Vec<SessionSummary>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Vec<SessionSummary>> {
        // Each push is a single Vec append, so the data stays consistent
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything recorded so far, oldest first.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.store().clone()
    }

    /// Lifetime step total across recorded sessions.
    pub fn total_steps(&self) -> u64 {
        self.sessions().iter().map(|s| s.steps).sum()
    }
}

impl SessionSink for MemorySink {
    fn session_finished(&mut self, summary: &SessionSummary) -> Result<()> {
        self.store().push(summary.clone());
        Ok(())
    }
}

/// Discards every session.
#[derive(Debug, Default)]
pub struct NullSink;

impl SessionSink for NullSink {
    fn session_finished(&mut self, _summary: &SessionSummary) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorStatus;

    fn summary(steps: u64) -> SessionSummary {
        SessionSummary {
            started_at_ms: 0,
            ended_at_ms: 60_000,
            steps,
            distance_m: 72.5,
            final_speed_mps: 1.2,
            elapsed_ms: 60_000,
            experience_gained: steps,
            geolocation_status: SensorStatus::Active,
            motion_status: SensorStatus::Unavailable,
        }
    }

    #[test]
    fn test_json_sink_writes_one_line_per_session() {
        let mut sink = JsonSink::new(Vec::new());
        sink.session_finished(&summary(10)).unwrap();
        sink.session_finished(&summary(20)).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: SessionSummary = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, summary(10));
        assert!(lines[1].contains("\"motion_status\":\"unavailable\""));
    }

    #[test]
    fn test_memory_sink_shares_store_between_clones() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.session_finished(&summary(5)).unwrap();
        writer.session_finished(&summary(7)).unwrap();
        assert_eq!(sink.sessions().len(), 2);
        assert_eq!(sink.total_steps(), 12);
    }

    #[test]
    fn test_memory_sink_survives_poisoned_lock() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.session_finished(&summary(3)).unwrap();

        let store = Arc::clone(&sink.sessions);
        let panicked = std::thread::spawn(move || {
            let _guard = store.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(panicked.is_err());
        assert!(sink.sessions.is_poisoned());

        // Reads and writes agree on the same store
        assert_eq!(sink.sessions().len(), 1);
        writer.session_finished(&summary(4)).unwrap();
        assert_eq!(sink.sessions().len(), 2);
        assert_eq!(sink.total_steps(), 7);
    }
}
