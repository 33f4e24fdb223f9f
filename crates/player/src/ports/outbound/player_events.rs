//! Player events - outbound port data types for server messages
//!
//! These types represent the application's view of server frames. The message
//! translator produces them from protocol `ServerMessage`s; the session applies
//! them to `SessionState`. The set is closed: every frame maps to exactly one
//! variant, with `Unrecognized` as the forward-compatible catch-all.

use secret_hitler_protocol::StateUpdates;

/// Events received from the game server
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    // =========================================================================
    // Identity & Lobby
    // =========================================================================
    /// The server assigned or confirmed the game id
    GameAssigned { game_id: String },
    /// The server assigned or confirmed this client's player id
    PlayerAssigned { player_id: String },
    /// The host started the game
    GameBegun,
    /// This client hosts the game
    HostGranted,

    // =========================================================================
    // Game Flow
    // =========================================================================
    /// A question this player must answer
    PromptReceived {
        action: String,
        text: String,
        choices: Vec<String>,
    },
    /// Partial patch of the synchronized state
    StateUpdated { updates: StateUpdates },

    // =========================================================================
    // Notifications
    // =========================================================================
    ServerError { message: String },
    ServerSuccess { message: String },

    /// A well-formed frame of a type this client does not handle
    Unrecognized { kind: String },
}

impl PlayerEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::GameAssigned { .. } => "game_assigned",
            PlayerEvent::PlayerAssigned { .. } => "player_assigned",
            PlayerEvent::GameBegun => "game_begun",
            PlayerEvent::HostGranted => "host_granted",
            PlayerEvent::PromptReceived { .. } => "prompt_received",
            PlayerEvent::StateUpdated { .. } => "state_updated",
            PlayerEvent::ServerError { .. } => "server_error",
            PlayerEvent::ServerSuccess { .. } => "server_success",
            PlayerEvent::Unrecognized { .. } => "unrecognized",
        }
    }
}
