//! Connection state shared between the session actor and its observers.

pub mod connection;

pub use connection::{set_connection_state, ConnectionState, ConnectionStateObserver};
