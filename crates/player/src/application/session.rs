//! The player session
//!
//! `Session` owns everything the client knows: the connection core, the
//! synchronized state, the identity store and the action dispatcher. It does no
//! I/O itself. Socket and timer events are fed in through the `handle_*` methods,
//! user intents through `on_*`, and the resulting socket/timer work is collected
//! as `TransportCommand`s for the driver to carry out.

use secret_hitler_protocol::ClientMessage;
use url::Url;

use crate::application::dispatcher::{ActionDispatcher, DispatchError};
use crate::application::dto::{FormSubmission, SubmittedChoice};
use crate::infrastructure::identity_store::IdentityStore;
use crate::infrastructure::message_translator;
use crate::infrastructure::messaging::ConnectionState;
use crate::ports::outbound::PlayerEvent;
use crate::infrastructure::websocket::{
    ClientMessageBuilder, ConnectionCore, RetryPolicy, SocketId, TimerId, TransportCommand,
};
use crate::state::SessionState;

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub state: SessionState,
    /// Most recent answer sent, keyed by prompt epoch
    pub submitted_choice: Option<SubmittedChoice>,
}

impl SessionSnapshot {
    /// Whether the current prompt still awaits an answer.
    pub fn awaiting_answer(&self) -> bool {
        match self.state.prompt() {
            Some(prompt) => self
                .submitted_choice
                .as_ref()
                .map_or(true, |s| s.epoch != prompt.epoch),
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    core: ConnectionCore,
    state: SessionState,
    identity: IdentityStore,
    dispatcher: ActionDispatcher,
    /// Socket whose `reconnect` has not been answered with `player_id` or
    /// `game_begun` yet.
    pending_rejoin: Option<SocketId>,
    commands: Vec<TransportCommand>,
    event_log_capacity: usize,
}

impl Session {
    pub fn new(
        endpoint: Url,
        retry: RetryPolicy,
        identity: IdentityStore,
        event_log_capacity: usize,
    ) -> Self {
        Self {
            core: ConnectionCore::new(endpoint, retry),
            state: SessionState::new(event_log_capacity),
            identity,
            dispatcher: ActionDispatcher::new(),
            pending_rejoin: None,
            commands: Vec::new(),
            event_log_capacity,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Begin connecting. Same as [`open`](Self::open).
    pub fn start(&mut self) {
        self.open();
    }

    /// Open a socket unless one is already connecting or connected.
    pub fn open(&mut self) -> bool {
        self.core.open(&mut self.commands)
    }

    /// Close the socket and cancel any pending retry. State is kept.
    pub fn stop(&mut self) {
        self.core.stop(&mut self.commands);
    }

    /// Drop all synchronized state, as on navigating away. Persisted identity
    /// and the connection are left alone.
    pub fn reset(&mut self) {
        tracing::info!("Resetting session state");
        self.state = SessionState::new(self.event_log_capacity);
        self.dispatcher.reset();
        self.pending_rejoin = None;
    }

    // =========================================================================
    // Transport events
    // =========================================================================

    pub fn handle_socket_opened(&mut self, socket: SocketId) {
        if !self.core.on_socket_opened(socket, &mut self.commands) {
            return;
        }
        self.pending_rejoin = None;

        let identity = self.identity.load_identity();
        let Some((game_id, player_id)) = identity.pair() else {
            tracing::debug!("No stored identity, skipping reconnect handshake");
            return;
        };

        tracing::info!(game_id, player_id, "Replaying reconnect handshake");
        self.commands.push(TransportCommand::Send {
            socket,
            message: ClientMessageBuilder::reconnect(game_id, player_id),
        });
        self.identity.save_game_id(game_id);
        self.identity.save_player_id(player_id);
        self.state.set_game_id(game_id);
        self.state.set_player_id(player_id);
        self.dispatcher.record_reconnect(socket);
        self.pending_rejoin = Some(socket);
    }

    /// Decode and apply one text frame. Frames from a stale socket and frames
    /// that fail to decode are dropped.
    pub fn handle_frame(&mut self, socket: SocketId, text: &str) {
        if self.core.connected_socket() != Some(socket) {
            tracing::debug!(?socket, "Dropping frame from stale socket");
            return;
        }

        match message_translator::decode(text) {
            Ok(event) => {
                if self.pending_rejoin == Some(socket) {
                    self.settle_rejoin(&event);
                }
                message_translator::apply(event, &mut self.state, &self.identity);
            }
            Err(e) => tracing::warn!("Dropping malformed frame: {}", e),
        }
    }

    /// The server answers a good `reconnect` with `player_id` or `game_begun`.
    /// An `error` first means the game or player is gone: forget the stored ids
    /// and let the player create or join a game on this socket.
    fn settle_rejoin(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::PlayerAssigned { .. } | PlayerEvent::GameBegun => {
                self.pending_rejoin = None;
            }
            PlayerEvent::ServerError { message } => {
                tracing::warn!(%message, "Reconnect refused, discarding stored identity");
                self.pending_rejoin = None;
                self.identity.clear();
                self.state.clear_identity();
                self.dispatcher.clear_reconnect();
            }
            _ => {}
        }
    }

    pub fn handle_socket_closed(&mut self, socket: SocketId) {
        self.core.on_socket_closed(socket, &mut self.commands);
    }

    pub fn handle_socket_error(&mut self, socket: SocketId, error: &str) {
        if self.core.on_socket_error(socket, &mut self.commands) {
            tracing::warn!(error, "WebSocket error");
        }
    }

    pub fn handle_retry_fired(&mut self, timer: TimerId) {
        self.core.on_retry_fired(timer, &mut self.commands);
    }

    // =========================================================================
    // User intents
    // =========================================================================

    /// Answer the current prompt.
    pub fn on_user_choice(&mut self, choice: &str) -> Result<(), DispatchError> {
        self.choose(None, choice)
    }

    /// Answer the prompt with the given epoch, if it is still current.
    pub fn on_user_choice_at(&mut self, epoch: u64, choice: &str) -> Result<(), DispatchError> {
        self.choose(Some(epoch), choice)
    }

    fn choose(&mut self, epoch: Option<u64>, choice: &str) -> Result<(), DispatchError> {
        let socket = self.core.connected_socket();
        let message = self.dispatcher.choose(&self.state, socket, epoch, choice)?;
        self.send(socket, message)
    }

    pub fn on_submit_form(&mut self, form: FormSubmission) -> Result<(), DispatchError> {
        let socket = self.core.connected_socket();
        let message = self.dispatcher.submit_form(&mut self.state, socket, form)?;
        self.send(socket, message)
    }

    fn send(&mut self, socket: Option<SocketId>, message: ClientMessage) -> Result<(), DispatchError> {
        let socket = socket.ok_or(DispatchError::NotConnected)?;
        self.commands.push(TransportCommand::Send { socket, message });
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn connection_state(&self) -> ConnectionState {
        self.core.state()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.core.state(),
            state: self.state.clone(),
            submitted_choice: self.dispatcher.submitted().cloned(),
        }
    }

    /// Drain the socket/timer work requested since the last call.
    pub fn take_commands(&mut self) -> Vec<TransportCommand> {
        std::mem::take(&mut self.commands)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::infrastructure::platform::mock::{InMemoryStorage, ManualClock};
    use crate::ports::outbound::storage_keys;
    use crate::state::SessionPhase;

    const NOW: u64 = 1_700_000_000;

    struct Harness {
        session: Session,
        identity: IdentityStore,
    }

    impl Harness {
        fn new() -> Self {
            let identity = IdentityStore::new(
                Arc::new(InMemoryStorage::new()),
                Arc::new(ManualClock::at(NOW)),
            );
            let session = Session::new(
                Url::parse("ws://localhost:3737/ws").unwrap(),
                RetryPolicy::fixed(Duration::from_millis(250)),
                identity.clone(),
                16,
            );
            Self { session, identity }
        }

        /// Open and connect a socket, returning its id and the commands emitted.
        fn connect(&mut self) -> (SocketId, Vec<TransportCommand>) {
            self.session.open();
            let socket = self
                .session
                .take_commands()
                .into_iter()
                .find_map(|c| match c {
                    TransportCommand::OpenSocket { socket, .. } => Some(socket),
                    _ => None,
                })
                .expect("expected an OpenSocket command");
            self.session.handle_socket_opened(socket);
            (socket, self.session.take_commands())
        }
    }

    fn sent(commands: &[TransportCommand]) -> Vec<ClientMessage> {
        commands
            .iter()
            .filter_map(|c| match c {
                TransportCommand::Send { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_fresh_client_gets_player_id_and_begins() {
        let mut h = Harness::new();
        let (socket, commands) = h.connect();
        assert!(sent(&commands).is_empty());

        assert_eq!(h.session.state().phase(), SessionPhase::PreGame);
        h.session
            .handle_frame(socket, r#"{"type":"player_id","player_id":"p1"}"#);
        assert_eq!(h.session.state().phase(), SessionPhase::AwaitingStart);
        h.session.handle_frame(socket, r#"{"type":"game_begun"}"#);
        assert_eq!(h.session.state().phase(), SessionPhase::InGame);

        assert_eq!(
            h.identity.load(storage_keys::PLAYER_ID),
            Some("p1".to_string())
        );
    }

    #[test]
    fn test_stored_identity_sends_reconnect_first() {
        let mut h = Harness::new();
        h.identity.save_game_id("g1");
        h.identity.save_player_id("p1");

        let (_, commands) = h.connect();
        assert_eq!(
            sent(&commands),
            vec![ClientMessage::Reconnect {
                game_id: "g1".into(),
                player_id: "p1".into()
            }]
        );
        assert_eq!(h.session.state().identity().pair(), Some(("g1", "p1")));

        // Join is refused on the connection that already rejoined.
        assert_eq!(
            h.session
                .on_submit_form(FormSubmission::join_game("g2", "bob")),
            Err(DispatchError::AlreadyRejoined)
        );
        assert!(h.session.take_commands().is_empty());
    }

    #[test]
    fn test_partial_identity_sends_no_handshake() {
        let mut h = Harness::new();
        h.identity.save_game_id("g1");

        let (_, commands) = h.connect();
        assert!(sent(&commands).is_empty());
    }

    #[test]
    fn test_player_id_alone_sends_no_handshake() {
        let mut h = Harness::new();
        h.identity.save_player_id("p1");

        let (_, commands) = h.connect();
        assert!(sent(&commands).is_empty());
        assert_eq!(h.session.state().identity().pair(), None);
        assert!(h
            .session
            .on_submit_form(FormSubmission::join_game("g1", "bob"))
            .is_ok());
    }

    #[test]
    fn test_refused_reconnect_reopens_lobby() {
        let mut h = Harness::new();
        h.identity.save_game_id("gone");
        h.identity.save_player_id("p0");

        let (socket, _) = h.connect();
        h.session
            .handle_frame(socket, r#"{"type":"error","msg":"Game does not exist."}"#);

        assert_eq!(h.identity.load_identity().pair(), None);
        assert_eq!(h.session.state().identity().pair(), None);
        assert_eq!(h.session.state().event_log().len(), 1);

        assert!(h
            .session
            .on_submit_form(FormSubmission::join_game("g2", "bob"))
            .is_ok());
        assert!(h
            .session
            .on_submit_form(FormSubmission::new_game("bob"))
            .is_ok());
        assert_eq!(sent(&h.session.take_commands()).len(), 2);

        // The next connection has nothing to replay.
        h.session.handle_socket_closed(socket);
        let timer = h
            .session
            .take_commands()
            .into_iter()
            .find_map(|c| match c {
                TransportCommand::ScheduleRetry { timer, .. } => Some(timer),
                _ => None,
            })
            .unwrap();
        h.session.handle_retry_fired(timer);
        let next = h
            .session
            .take_commands()
            .into_iter()
            .find_map(|c| match c {
                TransportCommand::OpenSocket { socket, .. } => Some(socket),
                _ => None,
            })
            .unwrap();
        h.session.handle_socket_opened(next);
        assert!(sent(&h.session.take_commands()).is_empty());
    }

    #[test]
    fn test_error_after_confirmed_reconnect_keeps_identity() {
        let mut h = Harness::new();
        h.identity.save_game_id("g1");
        h.identity.save_player_id("p1");

        let (socket, _) = h.connect();
        h.session
            .handle_frame(socket, r#"{"type":"player_id","player_id":"p1"}"#);
        h.session
            .handle_frame(socket, r#"{"type":"error","msg":"Not your turn."}"#);

        assert_eq!(h.identity.load_identity().pair(), Some(("g1", "p1")));
        assert_eq!(h.session.state().identity().pair(), Some(("g1", "p1")));
        assert_eq!(
            h.session
                .on_submit_form(FormSubmission::join_game("g2", "bob")),
            Err(DispatchError::AlreadyRejoined)
        );
    }

    #[test]
    fn test_prompt_answered_exactly_once() {
        let mut h = Harness::new();
        let (socket, _) = h.connect();
        h.session.handle_frame(
            socket,
            r#"{"type":"prompt","action":"vote","prompt":"vote for chancellor","choices":["ja","nein"]}"#,
        );

        h.session.on_user_choice("nein").unwrap();
        assert_eq!(
            h.session.on_user_choice("nein"),
            Err(DispatchError::AlreadySubmitted { epoch: 1 })
        );

        let commands = h.session.take_commands();
        assert_eq!(
            commands,
            vec![TransportCommand::Send {
                socket,
                message: ClientMessage::UserAction {
                    action: "vote".into(),
                    choice: "nein".into()
                }
            }]
        );

        let snapshot = h.session.snapshot();
        assert!(!snapshot.awaiting_answer());
        assert_eq!(
            snapshot.submitted_choice.map(|s| s.choice),
            Some("nein".to_string())
        );
    }

    #[test]
    fn test_answer_for_superseded_prompt_is_rejected() {
        let mut h = Harness::new();
        let (socket, _) = h.connect();
        let prompt = r#"{"type":"prompt","action":"vote","prompt":"?","choices":["ja","nein"]}"#;
        h.session.handle_frame(socket, prompt);
        h.session.handle_frame(socket, prompt);

        assert_eq!(h.session.state().prompt_epoch(), 2);
        assert_eq!(
            h.session.on_user_choice_at(1, "ja"),
            Err(DispatchError::StaleEpoch {
                expected: 2,
                got: 1
            })
        );
        assert!(h.session.on_user_choice_at(2, "ja").is_ok());
    }

    #[test]
    fn test_no_frames_sent_while_disconnected() {
        let mut h = Harness::new();
        h.session.open();
        h.session.take_commands();

        assert_eq!(
            h.session.on_submit_form(FormSubmission::new_game("alice")),
            Err(DispatchError::NotConnected)
        );
        assert!(h.session.take_commands().is_empty());
    }

    #[test]
    fn test_reconnect_keeps_state() {
        let mut h = Harness::new();
        let (socket, _) = h.connect();
        h.session.handle_frame(socket, r#"{"type":"game_id","game_id":"g1"}"#);
        h.session
            .handle_frame(socket, r#"{"type":"player_id","player_id":"p1"}"#);
        h.session.handle_frame(
            socket,
            r#"{"type":"state_update","updates":{"players":["a","b","c","d","e"]}}"#,
        );

        h.session.handle_socket_error(socket, "connection reset");
        let commands = h.session.take_commands();
        let timer = commands
            .iter()
            .find_map(|c| match c {
                TransportCommand::ScheduleRetry { timer, .. } => Some(*timer),
                _ => None,
            })
            .unwrap();
        assert_eq!(h.session.connection_state(), ConnectionState::Disconnected);

        h.session.handle_retry_fired(timer);
        assert_eq!(h.session.connection_state(), ConnectionState::Connecting);
        let next = h
            .session
            .take_commands()
            .into_iter()
            .find_map(|c| match c {
                TransportCommand::OpenSocket { socket, .. } => Some(socket),
                _ => None,
            })
            .unwrap();
        h.session.handle_socket_opened(next);

        assert_eq!(
            sent(&h.session.take_commands()),
            vec![ClientMessage::Reconnect {
                game_id: "g1".into(),
                player_id: "p1".into()
            }]
        );
        assert_eq!(h.session.state().roster().live_players.len(), 5);
        assert_eq!(h.session.state().phase(), SessionPhase::AwaitingStart);
    }

    #[test]
    fn test_frames_from_stale_socket_are_dropped() {
        let mut h = Harness::new();
        let (socket, _) = h.connect();
        h.session.handle_socket_closed(socket);

        h.session.handle_frame(socket, r#"{"type":"game_begun"}"#);
        assert_eq!(h.session.state().phase(), SessionPhase::PreGame);
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let mut h = Harness::new();
        let (socket, _) = h.connect();
        h.session.handle_frame(socket, r#"{"type":"is_host"}"#);
        let before = h.session.snapshot();

        h.session.handle_frame(socket, "{{{");
        h.session
            .handle_frame(socket, r#"{"type":"prompt","prompt":"missing fields"}"#);

        assert_eq!(h.session.snapshot(), before);
        assert_eq!(h.session.connection_state(), ConnectionState::Connected);
    }

    #[test]
    fn test_reset_clears_state_but_not_identity() {
        let mut h = Harness::new();
        let (socket, _) = h.connect();
        h.session
            .handle_frame(socket, r#"{"type":"player_id","player_id":"p1"}"#);
        h.session.handle_frame(socket, r#"{"type":"error","msg":"oops"}"#);

        h.session.reset();

        assert_eq!(h.session.state(), &SessionState::new(16));
        assert_eq!(h.identity.load(storage_keys::PLAYER_ID), Some("p1".into()));
        assert_eq!(h.session.connection_state(), ConnectionState::Connected);
    }

    #[test]
    fn test_stop_tears_down_and_suppresses_retry() {
        let mut h = Harness::new();
        let (socket, _) = h.connect();

        h.session.stop();
        assert_eq!(
            h.session.take_commands(),
            vec![TransportCommand::CloseSocket { socket }]
        );

        h.session.handle_socket_closed(socket);
        assert!(h.session.take_commands().is_empty());
        assert_eq!(h.session.connection_state(), ConnectionState::Disconnected);
    }
}
