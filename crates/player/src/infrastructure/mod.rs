pub mod identity_store;
pub mod message_translator;
pub mod messaging;
pub mod platform;
pub mod websocket;

// Re-export messaging types
pub use messaging::{ConnectionState, ConnectionStateObserver};
