//! Session state management
//!
//! Defines the session state machine and the records a session produces.

use crate::utils::error::ErrorResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current state of the streaming session
///
/// ```text
/// Idle → AcquiringPermission → Registering ─┬─────────────────────────────┬→ ConnectingTransport → Publishing → Live → Stopping → Idle
///                                           └→ Disconnecting → Registering ┘
/// ```
/// `Failed` can follow any step before `Live` and always leads back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Not streaming
    Idle,
    /// Waiting for camera access
    AcquiringPermission,
    /// Registration call in flight
    Registering,
    /// Clearing a stale registration before the single retry
    Disconnecting,
    /// Transport connect in flight, or settling after it
    ConnectingTransport,
    /// Transport publish in flight
    Publishing,
    /// Frames and telemetry are flowing
    Live,
    /// Teardown in progress
    Stopping,
    /// A start attempt failed and is being unwound
    Failed,
}

impl SessionState {
    /// Whether a start attempt is between `Idle` and `Live`
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            SessionState::AcquiringPermission
                | SessionState::Registering
                | SessionState::Disconnecting
                | SessionState::ConnectingTransport
                | SessionState::Publishing
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// What a call to `start` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The session is now live
    Live,
    /// Another start/stop was in flight, or the session was already live
    Ignored,
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub source_id: String,

    /// Wall-clock time the session went live
    pub started_at: DateTime<Utc>,

    /// Time spent live in milliseconds
    pub duration_ms: f64,

    pub frames_forwarded: u64,

    /// Frames that arrived while the relay was not published
    pub frames_dropped: u64,

    pub telemetry_pushed: u64,

    pub telemetry_failed: u64,

    /// Teardown failures that were logged and skipped
    pub teardown_warnings: Vec<String>,
}

/// Events emitted by the session coordinator
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The state machine moved
    StateChanged(SessionState),
    /// The session went live
    Started { source_id: String },
    /// The session was torn down
    Stopped(SessionSummary),
    /// A start attempt failed
    Error(ErrorResponse),
    /// A teardown step failed but teardown went on
    TeardownWarning(ErrorResponse),
}
