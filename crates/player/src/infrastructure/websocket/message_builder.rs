//! ClientMessage builder
//!
//! Centralizes construction of outbound frames so the dispatcher and the
//! connection handshake build them the same way.

use secret_hitler_protocol::ClientMessage;

/// Builder for ClientMessage variants
///
/// # Usage
///
/// ```rust,ignore
/// let msg = ClientMessageBuilder::user_action("vote", "ja");
/// session.send(msg)?;
/// ```
pub struct ClientMessageBuilder;

impl ClientMessageBuilder {
    // =========================================================================
    // Lobby Messages
    // =========================================================================

    /// Resume a previously joined game
    pub fn reconnect(game_id: &str, player_id: &str) -> ClientMessage {
        ClientMessage::Reconnect {
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
        }
    }

    /// Create a new game hosted by `host`
    pub fn new_game(host: &str) -> ClientMessage {
        ClientMessage::NewGame {
            host: host.to_string(),
        }
    }

    pub fn join_game(game_id: &str, player_name: &str) -> ClientMessage {
        ClientMessage::JoinGame {
            game_id: game_id.to_string(),
            player_name: player_name.to_string(),
        }
    }

    pub fn begin_game() -> ClientMessage {
        ClientMessage::BeginGame
    }

    // =========================================================================
    // In-Game Messages
    // =========================================================================

    /// Answer the active prompt
    pub fn user_action(action: &str, choice: &str) -> ClientMessage {
        ClientMessage::UserAction {
            action: action.to_string(),
            choice: choice.to_string(),
        }
    }
}
