//! Player intent DTOs (application layer)
//!
//! The presentation layer raises two kinds of intents: a choice answering the
//! current prompt, and one of the lobby forms below.

/// A submitted join/create/begin form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSubmission {
    /// Create a game hosted by this player
    NewGame { host: String },
    /// Join an existing game
    JoinGame { game_id: String, player_name: String },
    /// Host starts the game
    BeginGame,
}

impl FormSubmission {
    pub fn new_game(host: impl Into<String>) -> Self {
        Self::NewGame { host: host.into() }
    }

    pub fn join_game(game_id: impl Into<String>, player_name: impl Into<String>) -> Self {
        Self::JoinGame {
            game_id: game_id.into(),
            player_name: player_name.into(),
        }
    }

    /// Name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            FormSubmission::NewGame { .. } => "new_game",
            FormSubmission::JoinGame { .. } => "join_game",
            FormSubmission::BeginGame => "begin_game",
        }
    }
}

/// The answer already sent for a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedChoice {
    pub epoch: u64,
    pub choice: String,
}
