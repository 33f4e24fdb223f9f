//! Client-visible game state.
//!
//! `SessionState` is the only place synchronized state lives. It is created with
//! empty defaults, mutated in place by the message translator (and the two
//! optimistic flags of the dispatcher), and read by the presentation layer through
//! snapshots. Reconnecting never resets it.

use std::collections::BTreeMap;

use secret_hitler_protocol::StateUpdates;

use super::event_log::EventLog;

/// Server-declared lifecycle of this client's game.
///
/// Ordered: a phase only ever advances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    /// No player id assigned yet
    #[default]
    PreGame,
    /// In the waiting room
    AwaitingStart,
    /// Game in progress
    InGame,
    /// A winner was declared
    Finished,
}

/// Game and player ids assigned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub game_id: Option<String>,
    pub player_id: Option<String>,
}

impl Identity {
    /// Both ids, or nothing. A reconnect handshake needs the pair.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (&self.game_id, &self.player_id) {
            (Some(game_id), Some(player_id)) => Some((game_id, player_id)),
            _ => None,
        }
    }
}

/// A server question awaiting this player's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Echoed back in `user_action`
    pub action: String,
    pub text: String,
    pub choices: Vec<String>,
    /// Increments with every prompt frame; answers are keyed by it
    pub epoch: u64,
}

impl Prompt {
    pub fn offers(&self, choice: &str) -> bool {
        self.choices.iter().any(|c| c == choice)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterState {
    pub live_players: Vec<String>,
    pub eliminated_players: Vec<String>,
    pub president: Option<String>,
    pub chancellor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    pub liberal_progress: u32,
    pub fascist_progress: u32,
    pub election_tracker: u32,
    pub fascist_powers: Option<Vec<String>>,
    pub unused_tiles: Option<u32>,
    pub discarded_tiles: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    phase: SessionPhase,
    identity: Identity,
    is_host: bool,
    prompt: Option<Prompt>,
    prompt_epoch: u64,
    roster: RosterState,
    board: BoardState,
    secret_role: Option<String>,
    winner: Option<String>,
    extras: BTreeMap<String, serde_json::Value>,
    event_log: EventLog,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(super::event_log::DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl SessionState {
    pub fn new(event_log_capacity: usize) -> Self {
        Self {
            phase: SessionPhase::PreGame,
            identity: Identity::default(),
            is_host: false,
            prompt: None,
            prompt_epoch: 0,
            roster: RosterState::default(),
            board: BoardState::default(),
            secret_role: None,
            winner: None,
            extras: BTreeMap::new(),
            event_log: EventLog::new(event_log_capacity),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    /// Epoch of the latest prompt, 0 before the first one.
    pub fn prompt_epoch(&self) -> u64 {
        self.prompt_epoch
    }

    pub fn roster(&self) -> &RosterState {
        &self.roster
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    /// This player's secret role ("liberal", "fascist", "hitler"), once dealt
    pub fn secret_role(&self) -> Option<&str> {
        self.secret_role.as_deref()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// `state_update` keys without a typed field
    pub fn extras(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extras
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Move to `phase` if it is ahead of the current one. Returns whether it moved.
    pub(crate) fn advance_phase(&mut self, phase: SessionPhase) -> bool {
        if phase > self.phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "Session phase advanced");
            self.phase = phase;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_game_id(&mut self, game_id: impl Into<String>) {
        self.identity.game_id = Some(game_id.into());
    }

    pub(crate) fn set_player_id(&mut self, player_id: impl Into<String>) {
        self.identity.player_id = Some(player_id.into());
    }

    pub(crate) fn clear_identity(&mut self) {
        self.identity = Identity::default();
    }

    /// Host status is never revoked.
    pub(crate) fn latch_host(&mut self) {
        self.is_host = true;
    }

    /// Replace the current prompt, returning its epoch.
    pub(crate) fn replace_prompt(
        &mut self,
        action: String,
        text: String,
        choices: Vec<String>,
    ) -> u64 {
        self.prompt_epoch += 1;
        self.prompt = Some(Prompt {
            action,
            text,
            choices,
            epoch: self.prompt_epoch,
        });
        self.prompt_epoch
    }

    /// Shallow-merge a partial patch: keys absent from `updates` stay untouched.
    pub(crate) fn merge(&mut self, updates: StateUpdates) {
        let StateUpdates {
            players,
            eliminated_players,
            president,
            chancellor,
            liberal_progress,
            fascist_progress,
            election_tracker,
            fascist_powers,
            unused_tiles,
            discarded_tiles,
            identity,
            winner,
            extras,
        } = updates;

        if let Some(players) = players {
            self.roster.live_players = players;
        }
        if let Some(eliminated) = eliminated_players {
            self.roster.eliminated_players = eliminated;
        }
        if let Some(president) = president {
            self.roster.president = president;
        }
        if let Some(chancellor) = chancellor {
            self.roster.chancellor = chancellor;
        }
        if let Some(progress) = liberal_progress {
            self.board.liberal_progress = progress;
        }
        if let Some(progress) = fascist_progress {
            self.board.fascist_progress = progress;
        }
        if let Some(tracker) = election_tracker {
            self.board.election_tracker = tracker;
        }
        if let Some(powers) = fascist_powers {
            self.board.fascist_powers = powers;
        }
        if let Some(tiles) = unused_tiles {
            self.board.unused_tiles = tiles;
        }
        if let Some(tiles) = discarded_tiles {
            self.board.discarded_tiles = tiles;
        }
        if let Some(role) = identity {
            self.secret_role = role;
        }
        if let Some(winner) = winner {
            if winner.is_some() {
                self.advance_phase(SessionPhase::Finished);
            }
            self.winner = winner;
        }
        self.extras.extend(extras);
    }

    pub(crate) fn event_log_mut(&mut self) -> &mut EventLog {
        &mut self.event_log
    }
}
