//! WebSocket message types for server-player communication
//!
//! Every frame is a single JSON object discriminated by its `type` field.
//! The server sends `ServerMessage`, the player sends `ClientMessage`.

use serde::{Deserialize, Serialize};

use crate::updates::StateUpdates;

// =============================================================================
// Client Messages (Player → Server)
// =============================================================================

/// Messages from client (player) to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Re-assert a previously assigned identity after the socket reopened
    Reconnect { game_id: String, player_id: String },
    /// Create a new game hosted by `host`
    NewGame { host: String },
    /// Join an existing game under a display name
    JoinGame {
        game_id: String,
        player_name: String,
    },
    /// Host starts the game
    BeginGame,
    /// Answer to the current prompt
    UserAction { action: String, choice: String },
}

// =============================================================================
// Server Messages (Server → Player)
// =============================================================================

/// Messages from server to client (player)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The game this client belongs to
    GameId { game_id: String },
    /// The player id assigned to this client
    PlayerId { player_id: String },
    /// The host started the game
    GameBegun,
    /// This client is the game host
    IsHost,
    /// A question the player must answer with one of `choices`
    Prompt {
        action: String,
        prompt: String,
        choices: Vec<String>,
    },
    /// Partial patch of the synchronized game state
    StateUpdate { updates: StateUpdates },
    /// Server-side application error
    Error { msg: String },
    /// Server-side acknowledgement
    Success { msg: String },
    /// Any type this client does not understand
    #[serde(other)]
    Unknown,
}
