//! WebSocket session transport
//!
//! - `core`: sans-IO socket lifecycle and retry state machine
//! - `shared`: frame parsing and retry constants
//! - `message_builder`: ClientMessage construction
//! - `client`: tokio-tungstenite driver running the session actor

mod client;
mod core;
mod message_builder;
mod shared;

pub use client::{SessionError, SessionHandle};
pub use message_builder::ClientMessageBuilder;
pub use shared::{
    parse_server_message, FrameError, InboundFrame, BACKOFF_MULTIPLIER, INITIAL_RETRY_DELAY_MS,
    MAX_RETRY_DELAY_MS,
};

pub use self::core::{
    BackoffState, ConnectionCore, RetryPolicy, SocketId, TimerId, TransportCommand,
};
