//! Desktop session driver using tokio-tungstenite
//!
//! One actor task owns the [`Session`]. Socket tasks and retry-timer tasks only
//! post [`TransportEvent`]s back to it; they never touch state. The actor runs
//! the `TransportCommand`s the session emits and publishes a snapshot after
//! every step.

use std::collections::HashMap;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secret_hitler_protocol::ClientMessage;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::application::dispatcher::DispatchError;
use crate::application::dto::FormSubmission;
use crate::application::session::{Session, SessionSnapshot};
use crate::config::{ClientConfig, ConfigError};
use crate::infrastructure::identity_store::IdentityStore;
use crate::infrastructure::messaging::{
    set_connection_state, ConnectionState, ConnectionStateObserver,
};
use crate::infrastructure::websocket::{SocketId, TimerId, TransportCommand};
use crate::ports::outbound::{StorageProvider, TimeProvider};

const INTENT_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;
/// How long a released socket gets to send its Close frame before it is aborted.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Failure talking to the session actor
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] DispatchError),
    #[error("session is no longer running")]
    Closed,
}

enum Intent {
    Choose {
        epoch: Option<u64>,
        choice: String,
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },
    SubmitForm {
        form: FormSubmission,
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug)]
enum TransportEvent {
    Opened(SocketId),
    Frame(SocketId, String),
    Closed(SocketId),
    Error(SocketId, String),
    RetryFired(TimerId),
}

/// Presentation-side handle to a running session.
pub struct SessionHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<SessionSnapshot>,
    connection: ConnectionStateObserver,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Spawn the session actor and start connecting. Must be called inside a
    /// tokio runtime.
    pub fn start(
        config: &ClientConfig,
        storage: Arc<dyn StorageProvider>,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let identity = IdentityStore::new(storage, time);
        let session = Session::new(
            endpoint,
            config.retry,
            identity,
            config.event_log_capacity,
        );

        let (intent_tx, intent_rx) = mpsc::channel(INTENT_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connection_state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8()));

        let actor = SessionActor {
            session,
            events: event_tx,
            sockets: HashMap::new(),
            closing: Vec::new(),
            timers: HashMap::new(),
            snapshots: snapshot_tx,
            connection_state: Arc::clone(&connection_state),
        };
        let task = tokio::spawn(actor.run(intent_rx, event_rx, shutdown_rx));

        Ok(Self {
            intents: intent_tx,
            snapshots: snapshot_rx,
            connection: ConnectionStateObserver::new(connection_state),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn connection(&self) -> ConnectionStateObserver {
        self.connection.clone()
    }

    pub async fn on_user_choice(&self, choice: impl Into<String>) -> Result<(), SessionError> {
        self.choose(None, choice.into()).await
    }

    /// Answer the prompt with `epoch`; rejected if a newer prompt arrived.
    pub async fn on_user_choice_at(
        &self,
        epoch: u64,
        choice: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.choose(Some(epoch), choice.into()).await
    }

    async fn choose(&self, epoch: Option<u64>, choice: String) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Intent::Choose {
            epoch,
            choice,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)?.map_err(Into::into)
    }

    pub async fn on_submit_form(&self, form: FormSubmission) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Intent::SubmitForm { form, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?.map_err(Into::into)
    }

    /// Clear synchronized state, keeping the connection and stored identity.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Intent::Reset { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    async fn request(&self, intent: Intent) -> Result<(), SessionError> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Close the socket, cancel any retry and wait for the actor to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Session task failed: {}", e);
            }
        }
    }
}

struct SocketTask {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    handle: JoinHandle<()>,
}

impl SocketTask {
    /// Hang up the writer so the task sends a Close frame and exits. A task
    /// still stuck connecting is aborted once the grace period runs out.
    fn release(self) -> JoinHandle<()> {
        let Self { outbound, mut handle } = self;
        drop(outbound);
        tokio::spawn(async move {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        })
    }
}

struct SessionActor {
    session: Session,
    events: mpsc::Sender<TransportEvent>,
    sockets: HashMap<SocketId, SocketTask>,
    /// Released sockets still sending their Close frame
    closing: Vec<JoinHandle<()>>,
    timers: HashMap<TimerId, JoinHandle<()>>,
    snapshots: watch::Sender<SessionSnapshot>,
    connection_state: Arc<AtomicU8>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        mut events: mpsc::Receiver<TransportEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        self.session.start();
        self.flush();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                intent = intents.recv() => match intent {
                    Some(intent) => self.handle_intent(intent),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
            self.flush();
        }

        tracing::info!("Session shutting down");
        self.session.stop();
        self.flush();
        // Anything left running belongs to a socket or timer the core already released.
        let closing: Vec<_> = self
            .sockets
            .drain()
            .map(|(_, socket)| socket.release())
            .chain(self.closing.drain(..))
            .collect();
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        for task in closing {
            let _ = task.await;
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Choose {
                epoch,
                choice,
                reply,
            } => {
                let result = match epoch {
                    Some(epoch) => self.session.on_user_choice_at(epoch, &choice),
                    None => self.session.on_user_choice(&choice),
                };
                let _ = reply.send(result);
            }
            Intent::SubmitForm { form, reply } => {
                let _ = reply.send(self.session.on_submit_form(form));
            }
            Intent::Reset { reply } => {
                self.session.reset();
                let _ = reply.send(());
            }
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened(socket) => self.session.handle_socket_opened(socket),
            TransportEvent::Frame(socket, text) => self.session.handle_frame(socket, &text),
            TransportEvent::Closed(socket) => {
                self.sockets.remove(&socket);
                self.session.handle_socket_closed(socket);
            }
            TransportEvent::Error(socket, error) => {
                self.session.handle_socket_error(socket, &error);
            }
            TransportEvent::RetryFired(timer) => {
                self.timers.remove(&timer);
                self.session.handle_retry_fired(timer);
            }
        }
    }

    /// Carry out pending transport commands and publish the new state.
    fn flush(&mut self) {
        for command in self.session.take_commands() {
            self.execute(command);
        }

        set_connection_state(&self.connection_state, self.session.connection_state());
        let snapshot = self.session.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn execute(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::OpenSocket { socket, url } => {
                let (outbound, outbound_rx) = mpsc::unbounded_channel();
                let handle = tokio::spawn(run_socket(socket, url, outbound_rx, self.events.clone()));
                self.sockets.insert(socket, SocketTask { outbound, handle });
            }
            TransportCommand::CloseSocket { socket } => {
                if let Some(task) = self.sockets.remove(&socket) {
                    self.closing.retain(|handle| !handle.is_finished());
                    self.closing.push(task.release());
                }
            }
            TransportCommand::Send { socket, message } => match self.sockets.get(&socket) {
                Some(task) => {
                    if task.outbound.send(message).is_err() {
                        tracing::warn!(?socket, "Socket writer gone, frame dropped");
                    }
                }
                None => tracing::warn!(?socket, "No task for socket, frame dropped"),
            },
            TransportCommand::ScheduleRetry { timer, delay } => {
                let handle = tokio::spawn(run_timer(timer, delay, self.events.clone()));
                self.timers.insert(timer, handle);
            }
            TransportCommand::CancelRetry { timer } => {
                if let Some(handle) = self.timers.remove(&timer) {
                    handle.abort();
                }
            }
        }
    }
}

async fn run_timer(timer: TimerId, delay: Duration, events: mpsc::Sender<TransportEvent>) {
    tokio::time::sleep(delay).await;
    let _ = events.send(TransportEvent::RetryFired(timer)).await;
}

async fn run_socket(
    socket: SocketId,
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    events: mpsc::Sender<TransportEvent>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", url, e);
            let _ = events.send(TransportEvent::Error(socket, e.to_string())).await;
            return;
        }
    };

    if events.send(TransportEvent::Opened(socket)).await.is_err() {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Frame(socket, text)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Server closed connection");
                    let _ = events.send(TransportEvent::Closed(socket)).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(socket, e.to_string())).await;
                    break;
                }
            },
            message = outbound.recv() => {
                let Some(message) = message else {
                    tracing::debug!(?socket, "Closing released socket");
                    let _ = write.close().await;
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to serialize WebSocket message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json)).await {
                    let _ = events.send(TransportEvent::Error(socket, e.to_string())).await;
                    break;
                }
            }
        }
    }
}
