//! Streaming session
//!
//! This module implements the session lifecycle:
//! - SessionState machine and the events it emits
//! - SessionCoordinator driving registration, relay, capture and telemetry

pub mod coordinator;
pub mod state;

pub use coordinator::{SessionCoordinator, SessionDeps};
pub use state::{SessionEvent, SessionState, SessionSummary, StartOutcome};
