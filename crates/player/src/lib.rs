//! Secret Hitler Player crate.
//!
//! The client-side session and state-synchronization layer: it keeps one
//! WebSocket connection to the game server alive, replays the stored identity
//! after reconnecting, folds server frames into `SessionState`, and validates
//! the player's outbound intents. Presentation is left to the caller, which
//! reads snapshots and raises intents through a `SessionHandle`.

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod ports;
pub mod state;

#[cfg(test)]
mod e2e_tests;
