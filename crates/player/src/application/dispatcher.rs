//! Action dispatcher for outbound player intents
//!
//! Validates an intent against the current session state and builds the frame
//! to send. Every rejection happens before anything is sent, so a rejected
//! intent emits nothing and changes nothing.

use secret_hitler_protocol::ClientMessage;

use crate::application::dto::{FormSubmission, SubmittedChoice};
use crate::infrastructure::websocket::{ClientMessageBuilder, SocketId};
use crate::state::{SessionPhase, SessionState};

/// Why an intent was rejected locally
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("not connected to the server")]
    NotConnected,
    #[error("there is no prompt to answer")]
    NoActivePrompt,
    #[error("`{choice}` is not one of the offered choices")]
    InvalidChoice { choice: String },
    #[error("prompt {epoch} was already answered")]
    AlreadySubmitted { epoch: u64 },
    #[error("answer targets prompt {got}, current prompt is {expected}")]
    StaleEpoch { expected: u64, got: u64 },
    #[error("{intent} is not allowed while {phase:?}")]
    WrongPhase {
        intent: &'static str,
        phase: SessionPhase,
    },
    #[error("form field `{field}` must not be empty")]
    InvalidForm { field: &'static str },
    #[error("already rejoined a game on this connection")]
    AlreadyRejoined,
}

/// Tracks what was already sent so duplicates can be refused.
#[derive(Debug, Default)]
pub struct ActionDispatcher {
    submitted: Option<SubmittedChoice>,
    rejoined_on: Option<SocketId>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The answer sent for the most recent answered prompt.
    pub fn submitted(&self) -> Option<&SubmittedChoice> {
        self.submitted.as_ref()
    }

    /// A `reconnect` handshake went out on `socket`.
    pub fn record_reconnect(&mut self, socket: SocketId) {
        self.rejoined_on = Some(socket);
    }

    /// The server refused the `reconnect`, so the lobby forms are open again.
    pub fn clear_reconnect(&mut self) {
        self.rejoined_on = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Answer the current prompt. With `epoch` set, the answer is only accepted
    /// if that prompt is still the current one.
    pub fn choose(
        &mut self,
        state: &SessionState,
        connected: Option<SocketId>,
        epoch: Option<u64>,
        choice: &str,
    ) -> Result<ClientMessage, DispatchError> {
        let result = self.validate_choice(state, connected, epoch, choice);
        match result {
            Ok(message) => {
                let epoch = state.prompt_epoch();
                self.submitted = Some(SubmittedChoice {
                    epoch,
                    choice: choice.to_string(),
                });
                tracing::info!(epoch, choice, "Submitting answer");
                Ok(message)
            }
            Err(e) => {
                tracing::debug!(choice, "Choice rejected: {}", e);
                Err(e)
            }
        }
    }

    fn validate_choice(
        &self,
        state: &SessionState,
        connected: Option<SocketId>,
        epoch: Option<u64>,
        choice: &str,
    ) -> Result<ClientMessage, DispatchError> {
        connected.ok_or(DispatchError::NotConnected)?;
        let prompt = state.prompt().ok_or(DispatchError::NoActivePrompt)?;

        if let Some(got) = epoch {
            if got != prompt.epoch {
                return Err(DispatchError::StaleEpoch {
                    expected: prompt.epoch,
                    got,
                });
            }
        }

        if self
            .submitted
            .as_ref()
            .is_some_and(|s| s.epoch == prompt.epoch)
        {
            return Err(DispatchError::AlreadySubmitted {
                epoch: prompt.epoch,
            });
        }

        if !prompt.offers(choice) {
            return Err(DispatchError::InvalidChoice {
                choice: choice.to_string(),
            });
        }

        Ok(ClientMessageBuilder::user_action(&prompt.action, choice))
    }

    /// Build the frame for a lobby form. `new_game` latches the host flag
    /// optimistically.
    pub fn submit_form(
        &mut self,
        state: &mut SessionState,
        connected: Option<SocketId>,
        form: FormSubmission,
    ) -> Result<ClientMessage, DispatchError> {
        let kind = form.kind();
        let result = self.validate_form(state, connected, form);
        match result {
            Ok(message) => {
                if matches!(message, ClientMessage::NewGame { .. }) {
                    state.latch_host();
                }
                tracing::info!(form = kind, "Submitting form");
                Ok(message)
            }
            Err(e) => {
                tracing::debug!(form = kind, "Form rejected: {}", e);
                Err(e)
            }
        }
    }

    fn validate_form(
        &self,
        state: &SessionState,
        connected: Option<SocketId>,
        form: FormSubmission,
    ) -> Result<ClientMessage, DispatchError> {
        let socket = connected.ok_or(DispatchError::NotConnected)?;

        match form {
            FormSubmission::NewGame { host } => {
                self.ensure_not_rejoined(socket)?;
                let host = required(&host, "host")?;
                Ok(ClientMessageBuilder::new_game(host))
            }
            FormSubmission::JoinGame {
                game_id,
                player_name,
            } => {
                self.ensure_not_rejoined(socket)?;
                let game_id = required(&game_id, "game_id")?;
                let player_name = required(&player_name, "player_name")?;
                Ok(ClientMessageBuilder::join_game(game_id, player_name))
            }
            FormSubmission::BeginGame => {
                if state.phase() != SessionPhase::AwaitingStart {
                    return Err(DispatchError::WrongPhase {
                        intent: "begin_game",
                        phase: state.phase(),
                    });
                }
                Ok(ClientMessageBuilder::begin_game())
            }
        }
    }

    fn ensure_not_rejoined(&self, socket: SocketId) -> Result<(), DispatchError> {
        if self.rejoined_on == Some(socket) {
            Err(DispatchError::AlreadyRejoined)
        } else {
            Ok(())
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, DispatchError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DispatchError::InvalidForm { field })
    } else {
        Ok(trimmed)
    }
}
