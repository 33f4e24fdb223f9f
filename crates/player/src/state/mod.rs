//! Synchronized session state
//!
//! Everything the presentation layer may read about the game lives here. It is
//! owned by a single `Session`, so it needs no interior mutability.

mod event_log;
mod session_state;

pub use event_log::{EventLog, EventLogEntry, DEFAULT_EVENT_LOG_CAPACITY};
pub use session_state::{
    BoardState, Identity, Prompt, RosterState, SessionPhase, SessionState,
};
