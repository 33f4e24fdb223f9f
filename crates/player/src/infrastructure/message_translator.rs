//! Translates ServerMessage from protocol to PlayerEvent and routes it
//!
//! This is the inbound side of the session: a raw text frame is parsed into a
//! protocol `ServerMessage`, translated into a `PlayerEvent`, and then applied to
//! `SessionState` through one dispatch table. Frames that fail to parse are
//! dropped before anything is touched, so a frame is never half-applied.

use crate::infrastructure::identity_store::IdentityStore;
use crate::infrastructure::websocket::{parse_server_message, FrameError, InboundFrame};
use crate::ports::outbound::PlayerEvent;
use crate::state::{SessionPhase, SessionState};
use secret_hitler_protocol::ServerMessage;

/// Parse and translate one inbound text frame.
pub fn decode(text: &str) -> Result<PlayerEvent, FrameError> {
    parse_server_message(text).map(translate)
}

/// Translate a decoded frame into a PlayerEvent
pub fn translate(frame: InboundFrame) -> PlayerEvent {
    match frame.message {
        ServerMessage::GameId { game_id } => PlayerEvent::GameAssigned { game_id },
        ServerMessage::PlayerId { player_id } => PlayerEvent::PlayerAssigned { player_id },
        ServerMessage::GameBegun => PlayerEvent::GameBegun,
        ServerMessage::IsHost => PlayerEvent::HostGranted,
        ServerMessage::Prompt {
            action,
            prompt,
            choices,
        } => PlayerEvent::PromptReceived {
            action,
            text: prompt,
            choices,
        },
        ServerMessage::StateUpdate { updates } => PlayerEvent::StateUpdated { updates },
        ServerMessage::Error { msg } => PlayerEvent::ServerError { message: msg },
        ServerMessage::Success { msg } => PlayerEvent::ServerSuccess { message: msg },
        ServerMessage::Unknown => PlayerEvent::Unrecognized { kind: frame.kind },
    }
}

/// Apply one event to the session state, persisting identity as it arrives.
pub fn apply(event: PlayerEvent, state: &mut SessionState, identity: &IdentityStore) {
    tracing::debug!(event = event.name(), "Applying server event");

    match event {
        PlayerEvent::GameAssigned { game_id } => {
            identity.save_game_id(&game_id);
            state.set_game_id(game_id);
        }
        PlayerEvent::PlayerAssigned { player_id } => {
            identity.save_player_id(&player_id);
            state.set_player_id(player_id);
            state.advance_phase(SessionPhase::AwaitingStart);
        }
        PlayerEvent::GameBegun => {
            state.advance_phase(SessionPhase::InGame);
        }
        PlayerEvent::HostGranted => state.latch_host(),
        PlayerEvent::PromptReceived {
            action,
            text,
            choices,
        } => {
            let epoch = state.replace_prompt(action, text, choices);
            tracing::debug!(epoch, "Prompt replaced");
        }
        PlayerEvent::StateUpdated { updates } => state.merge(updates),
        PlayerEvent::ServerError { message } => {
            tracing::warn!(%message, "Server reported an error");
            state.event_log_mut().push_error(message);
        }
        PlayerEvent::ServerSuccess { message } => {
            state.event_log_mut().push_success(message);
        }
        PlayerEvent::Unrecognized { kind } => {
            tracing::info!(%kind, "Ignoring unrecognized message type");
        }
    }
}
