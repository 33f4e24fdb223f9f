//! Shared harness: a scripted game server and client wiring.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use url::Url;

use crate::application::session::SessionSnapshot;
use crate::config::ClientConfig;
use crate::infrastructure::identity_store::IdentityStore;
use crate::infrastructure::platform::mock::{InMemoryStorage, ManualClock};
use crate::infrastructure::websocket::{RetryPolicy, SessionHandle};

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);
pub const TEST_NOW: u64 = 1_700_000_000;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// A scripted game server on an ephemeral port.
pub struct FakeServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl FakeServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self { listener, addr }
    }

    /// The page the client pretends to be served from.
    pub fn page_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    /// Wait for the next client connection and complete the handshake.
    pub async fn accept(&self) -> ServerSocket {
        let (stream, _) = tokio::time::timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .expect("client did not connect in time")
            .unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    /// True if a client connects within `window`.
    pub async fn connects_within(&self, window: Duration) -> bool {
        tokio::time::timeout(window, self.listener.accept())
            .await
            .is_ok()
    }
}

pub async fn send_json(ws: &mut ServerSocket, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame from the client, parsed as JSON.
pub async fn recv_json(ws: &mut ServerSocket) -> Value {
    loop {
        let msg = tokio::time::timeout(STEP_TIMEOUT, ws.next())
            .await
            .expect("no frame from client in time")
            .expect("client closed the socket")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Whether the client sends another text frame within `window`.
pub async fn sends_within(ws: &mut ServerSocket, window: Duration) -> bool {
    matches!(
        tokio::time::timeout(window, ws.next()).await,
        Ok(Some(Ok(Message::Text(_))))
    )
}

/// Whether the client sends a Close frame within `window`, skipping any text.
pub async fn closes_within(ws: &mut ServerSocket, window: Duration) -> bool {
    let closed = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    };
    tokio::time::timeout(window, closed).await.unwrap_or(false)
}

pub struct TestClient {
    pub handle: SessionHandle,
    pub identity: IdentityStore,
}

/// Start a client against `server`, with fast fixed retries and in-memory storage.
/// `stored` seeds the identity store before the first connection.
pub fn start_client(server: &FakeServer, stored: Option<(&str, &str)>) -> TestClient {
    let storage = Arc::new(InMemoryStorage::new());
    let clock = Arc::new(ManualClock::at(TEST_NOW));
    let identity = IdentityStore::new(storage.clone(), clock.clone());
    if let Some((game_id, player_id)) = stored {
        identity.save_game_id(game_id);
        identity.save_player_id(player_id);
    }

    let config = ClientConfig {
        page_url: server.page_url(),
        retry: RetryPolicy::fixed(Duration::from_millis(50)),
        event_log_capacity: 50,
        storage_path: None,
    };
    let handle = SessionHandle::start(&config, storage, clock).unwrap();
    TestClient { handle, identity }
}

/// Wait until a published snapshot satisfies `predicate`.
pub async fn wait_for_snapshot(
    rx: &mut watch::Receiver<SessionSnapshot>,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(STEP_TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("snapshot condition not reached in time")
        .unwrap()
        .clone()
}
