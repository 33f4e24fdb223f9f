//! Secret Hitler Protocol - Shared types for server and player communication
//!
//! This crate contains the JSON-over-WebSocket vocabulary exchanged between the
//! game server and the player client:
//! - WebSocket message types (ClientMessage, ServerMessage)
//! - The partial state patch carried by `state_update` frames
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde and serde_json
//! 2. **No business logic** - Pure data types and serialization
//! 3. **Forward compatible** - Unknown message types and unknown fields never fail decoding

pub mod messages;
pub mod updates;

// =============================================================================
// WebSocket Message Types
// =============================================================================
pub use messages::{ClientMessage, ServerMessage};

// =============================================================================
// State Patches
// =============================================================================
pub use updates::StateUpdates;
