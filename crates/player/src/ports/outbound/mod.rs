//! Outbound ports - Interfaces for external services
//!
//! These ports define the contracts that infrastructure adapters must implement,
//! allowing the session to persist identity and read the clock without
//! depending on concrete implementations.

pub mod platform;
pub mod player_events;

pub use platform::{storage_keys, StorageProvider, TimeProvider};
pub use player_events::PlayerEvent;
