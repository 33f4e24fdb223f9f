//! Platform-agnostic core logic for the session socket.
//!
//! This is deliberately free of any runtime dependencies (tokio, tungstenite).
//! The core decides *what* should happen to sockets and retry timers and emits
//! [`TransportCommand`]s; the driver owns the actual socket and timer tasks and
//! feeds their events back in.
//!
//! Every socket attempt and every retry timer gets a fresh generation id. Events
//! carrying an id that is no longer current are ignored, which keeps the
//! "one socket, one timer" invariants under arbitrary event interleavings.

use std::time::Duration;

use secret_hitler_protocol::ClientMessage;
use url::Url;

use super::shared::{BACKOFF_MULTIPLIER, INITIAL_RETRY_DELAY_MS, MAX_RETRY_DELAY_MS};
use crate::infrastructure::messaging::ConnectionState;

/// Generation id of one socket attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Generation id of one retry timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Side effects requested from the transport driver.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    OpenSocket { socket: SocketId, url: Url },
    CloseSocket { socket: SocketId },
    Send { socket: SocketId, message: ClientMessage },
    ScheduleRetry { timer: TimerId, delay: Duration },
    CancelRetry { timer: TimerId },
}

/// How long to wait between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Same delay before every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }
}

/// Capped exponential backoff. Never exhausts: the client retries while it runs.
#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    policy: RetryPolicy,
    attempts: u32,
    delay: Duration,
}

impl BackoffState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            delay: policy.initial_delay,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance to the next attempt, updating the delay for the subsequent attempt.
    ///
    /// Returns the delay to wait *before* performing this attempt.
    pub fn next_delay_and_advance(&mut self) -> Duration {
        let current = self.delay;
        self.attempts = self.attempts.saturating_add(1);
        self.delay = current
            .mul_f64(self.policy.multiplier.max(1.0))
            .min(self.policy.max_delay.max(self.policy.initial_delay));
        current
    }
}

/// Socket lifecycle state machine.
#[derive(Debug)]
pub struct ConnectionCore {
    url: Url,
    state: ConnectionState,
    live_socket: Option<SocketId>,
    pending_retry: Option<TimerId>,
    next_generation: u64,
    backoff: BackoffState,
    stopped: bool,
}

impl ConnectionCore {
    pub fn new(url: Url, policy: RetryPolicy) -> Self {
        Self {
            url,
            state: ConnectionState::Disconnected,
            live_socket: None,
            pending_retry: None,
            next_generation: 0,
            backoff: BackoffState::new(policy),
            stopped: false,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The current socket attempt, open or still connecting.
    pub fn live_socket(&self) -> Option<SocketId> {
        self.live_socket
    }

    /// The socket frames may be sent on, if connected.
    pub fn connected_socket(&self) -> Option<SocketId> {
        match self.state {
            ConnectionState::Connected => self.live_socket,
            _ => None,
        }
    }

    pub fn pending_retry(&self) -> Option<TimerId> {
        self.pending_retry
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Start a socket attempt unless one is already live.
    ///
    /// Returns whether a new attempt was started.
    pub fn open(&mut self, out: &mut Vec<TransportCommand>) -> bool {
        self.stopped = false;

        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            tracing::debug!(state = ?self.state, "open() ignored, socket already live");
            return false;
        }

        if let Some(timer) = self.pending_retry.take() {
            out.push(TransportCommand::CancelRetry { timer });
        }

        let socket = SocketId(self.next_generation());
        self.live_socket = Some(socket);
        self.state = ConnectionState::Connecting;
        tracing::info!(url = %self.url, attempt = self.backoff.attempts(), "Connecting");
        out.push(TransportCommand::OpenSocket {
            socket,
            url: self.url.clone(),
        });
        true
    }

    /// Returns whether the event was for the live socket.
    pub fn on_socket_opened(&mut self, socket: SocketId, out: &mut Vec<TransportCommand>) -> bool {
        if self.live_socket != Some(socket) || self.state != ConnectionState::Connecting {
            tracing::debug!(?socket, "Ignoring open event from stale socket");
            return false;
        }

        self.state = ConnectionState::Connected;
        self.backoff.reset();
        if let Some(timer) = self.pending_retry.take() {
            out.push(TransportCommand::CancelRetry { timer });
        }
        tracing::info!(url = %self.url, "Connected");
        true
    }

    /// Returns whether the event was for the live socket.
    pub fn on_socket_closed(&mut self, socket: SocketId, out: &mut Vec<TransportCommand>) -> bool {
        if self.live_socket != Some(socket) {
            tracing::debug!(?socket, "Ignoring close event from stale socket");
            return false;
        }

        tracing::info!("Connection closed");
        self.live_socket = None;
        self.state = ConnectionState::Disconnected;
        self.schedule_retry(out);
        true
    }

    /// Errors do not self-resolve: the socket is closed before retrying.
    ///
    /// Returns whether the event was for the live socket.
    pub fn on_socket_error(&mut self, socket: SocketId, out: &mut Vec<TransportCommand>) -> bool {
        if self.live_socket != Some(socket) {
            tracing::debug!(?socket, "Ignoring error event from stale socket");
            return false;
        }

        out.push(TransportCommand::CloseSocket { socket });
        self.live_socket = None;
        self.state = ConnectionState::Disconnected;
        self.schedule_retry(out);
        true
    }

    /// Returns whether a new socket attempt was started.
    pub fn on_retry_fired(&mut self, timer: TimerId, out: &mut Vec<TransportCommand>) -> bool {
        if self.pending_retry != Some(timer) {
            tracing::debug!(?timer, "Ignoring stale retry timer");
            return false;
        }

        self.pending_retry = None;
        if self.stopped {
            return false;
        }
        self.open(out)
    }

    /// Tear down: close any live socket, cancel any pending retry, stay down
    /// until the next explicit [`open`](Self::open).
    pub fn stop(&mut self, out: &mut Vec<TransportCommand>) {
        self.stopped = true;
        if let Some(socket) = self.live_socket.take() {
            out.push(TransportCommand::CloseSocket { socket });
        }
        if let Some(timer) = self.pending_retry.take() {
            out.push(TransportCommand::CancelRetry { timer });
        }
        self.state = ConnectionState::Disconnected;
    }

    fn schedule_retry(&mut self, out: &mut Vec<TransportCommand>) {
        if self.stopped || self.pending_retry.is_some() {
            return;
        }

        let delay = self.backoff.next_delay_and_advance();
        let timer = TimerId(self.next_generation());
        self.pending_retry = Some(timer);
        tracing::info!(
            attempt = self.backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        out.push(TransportCommand::ScheduleRetry { timer, delay });
    }
}
