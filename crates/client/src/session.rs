//! Mutable per-session state shared between the reader, the heartbeat
//! task, and the reconnect controller
//!
//! All accesses are short lock-and-release critical sections; nothing
//! holds the lock across an await point.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

/// Whether the next connection identifies from scratch or resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SessionMode {
    #[default]
    Fresh,
    Resuming,
}

#[derive(Debug, Default)]
struct Session {
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
    last_sequence: Option<u64>,
    heartbeat_interval: Option<Duration>,
    mode: SessionMode,
}

/// Handle to the session state, cheap to clone across tasks.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedSession(Arc<Mutex<Session>>);

impl SharedSession {
    /// The last sequence number observed on this session.
    pub(crate) fn sequence(&self) -> Option<u64> {
        self.0.lock().last_sequence
    }

    /// Records a dispatch sequence number. Sequence numbers never move
    /// backwards within a session.
    pub(crate) fn record_sequence(&self, seq: u64) {
        let mut session = self.0.lock();
        match session.last_sequence {
            Some(previous) if previous > seq => {}
            _ => session.last_sequence = Some(seq),
        }
    }

    pub(crate) fn set_heartbeat_interval(&self, interval: Duration) {
        self.0.lock().heartbeat_interval = Some(interval);
    }

    pub(crate) fn heartbeat_interval(&self) -> Option<Duration> {
        self.0.lock().heartbeat_interval
    }

    /// Stores the resumption info delivered by READY and switches the
    /// session into resuming mode for subsequent connections.
    pub(crate) fn ready(&self, session_id: String, resume_gateway_url: String) {
        let mut session = self.0.lock();
        debug!(%session_id, "session established");
        session.session_id = Some(session_id);
        session.resume_gateway_url = Some(resume_gateway_url);
        session.mode = SessionMode::Resuming;
    }

    /// Discards the session entirely; the next connection identifies
    /// from scratch.
    pub(crate) fn invalidate(&self) {
        let mut session = self.0.lock();
        session.session_id = None;
        session.resume_gateway_url = None;
        session.last_sequence = None;
        session.mode = SessionMode::Fresh;
    }

    /// Clears connection-scoped fields before a fresh identify. The
    /// sequence counter only resets when the mode transitions to fresh.
    pub(crate) fn reset_for_fresh(&self) {
        let mut session = self.0.lock();
        session.last_sequence = None;
        session.mode = SessionMode::Fresh;
    }

    /// The URL to reconnect to when this session can be resumed.
    pub(crate) fn resume_target(&self) -> Option<String> {
        let session = self.0.lock();
        match session.mode {
            SessionMode::Resuming => session.resume_gateway_url.clone(),
            SessionMode::Fresh => None,
        }
    }

    /// The session id and sequence number to present in a resume payload.
    ///
    /// Resuming without a stored session id is a programming error; the
    /// sequence falls back to zero, which must still be sent.
    pub(crate) fn resume_info(&self) -> Option<(String, u64)> {
        let session = self.0.lock();
        debug_assert!(
            session.mode == SessionMode::Resuming || session.session_id.is_none(),
            "session id held outside resuming mode"
        );
        let id = session.session_id.clone()?;
        debug_assert!(
            session.last_sequence.is_some(),
            "resuming without a recorded sequence"
        );
        Some((id, session.last_sequence.unwrap_or(0)))
    }
}
